//! Pattern representation
//!
//! A pattern is an ordered list of pattern-nodes. Node 0 is the anchor; every
//! later node names an earlier node and the relation that must hold between
//! the two, plus an attribute predicate over the candidate graph node.

use crate::graph::{Graph, Node};
use regex::Regex;
use std::fmt::{self, Debug};
use thiserror::Error;

/// Index of a node within its pattern
pub type PatternNodeId = usize;

#[derive(Debug, Error, PartialEq)]
pub enum PatternError {
    #[error("Pattern error: empty pattern")]
    Empty,

    #[error("Pattern error: duplicate node name: {0}")]
    DuplicateName(String),

    #[error("Pattern error: node {node} refers to unknown or later node {anchor}")]
    UnknownAnchor { node: String, anchor: String },

    #[error("Pattern error: unsupported relation operator: {0}")]
    UnknownRelOp(String),

    #[error("Pattern error: invalid regex {pattern}: {message}")]
    BadRegex { pattern: String, message: String },
}

/// Token attribute a predicate looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Form,
    /// Lowercased form
    Lower,
    Lemma,
    Upos,
    Xpos,
    Feats,
    DepRel,
    EntType,
}

/// Test applied to an attribute value
#[derive(Clone)]
pub enum ValueTest {
    Literal(String),
    /// Case-insensitive equality; stored lowercased
    IgnoreCase(String),
    In(Vec<String>),
    NotIn(Vec<String>),
    Regex(String, Regex), // Pattern string + compiled regex
}

impl ValueTest {
    pub fn ignore_case(value: &str) -> Self {
        ValueTest::IgnoreCase(value.to_lowercase())
    }

    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        Regex::new(pattern)
            .map(|re| ValueTest::Regex(pattern.to_string(), re))
            .map_err(|e| PatternError::BadRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    #[inline]
    pub fn test(&self, value: &str) -> bool {
        match self {
            ValueTest::Literal(s) => value == s,
            ValueTest::IgnoreCase(s) => value.to_lowercase() == *s,
            ValueTest::In(set) => set.iter().any(|s| s == value),
            ValueTest::NotIn(set) => !set.iter().any(|s| s == value),
            ValueTest::Regex(_, re) => re.is_match(value),
        }
    }
}

// Manual Debug implementation
impl Debug for ValueTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueTest::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            ValueTest::IgnoreCase(s) => f.debug_tuple("IgnoreCase").field(s).finish(),
            ValueTest::In(v) => f.debug_tuple("In").field(v).finish(),
            ValueTest::NotIn(v) => f.debug_tuple("NotIn").field(v).finish(),
            ValueTest::Regex(pattern, _) => f.debug_tuple("Regex").field(pattern).finish(),
        }
    }
}

// Manual PartialEq implementation (compare pattern strings, not compiled regex)
impl PartialEq for ValueTest {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueTest::Literal(a), ValueTest::Literal(b)) => a == b,
            (ValueTest::IgnoreCase(a), ValueTest::IgnoreCase(b)) => a == b,
            (ValueTest::In(a), ValueTest::In(b)) => a == b,
            (ValueTest::NotIn(a), ValueTest::NotIn(b)) => a == b,
            (ValueTest::Regex(a, _), ValueTest::Regex(b, _)) => a == b,
            _ => false,
        }
    }
}

/// Attribute predicate over a single graph node
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Any,
    Attr(Attr, ValueTest),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn upos(value: &str) -> Self {
        Predicate::Attr(Attr::Upos, ValueTest::Literal(value.to_string()))
    }

    pub fn deprel(value: &str) -> Self {
        Predicate::Attr(Attr::DepRel, ValueTest::Literal(value.to_string()))
    }

    pub fn deprel_in<S: AsRef<str>>(values: &[S]) -> Self {
        Predicate::Attr(
            Attr::DepRel,
            ValueTest::In(values.iter().map(|s| s.as_ref().to_string()).collect()),
        )
    }

    /// Lemma equal to `value`, ignoring case
    pub fn lemma_is(value: &str) -> Self {
        Predicate::Attr(Attr::Lemma, ValueTest::ignore_case(value))
    }

    pub fn and(self, other: Predicate) -> Self {
        merge_predicates(self, other)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Predicate::Any)
    }

    pub fn matches(&self, graph: &Graph, node: &Node) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::Attr(attr, test) => match attr {
                Attr::Form => test.test(graph.resolve(node.form)),
                Attr::Lower => test.test(&graph.resolve(node.form).to_lowercase()),
                Attr::Lemma => test.test(graph.resolve(node.lemma)),
                Attr::Upos => test.test(graph.resolve(node.upos)),
                Attr::Xpos => test.test(graph.resolve(node.xpos)),
                Attr::Feats => test.test(graph.resolve(node.feats)),
                Attr::DepRel => test.test(graph.resolve(node.deprel)),
                Attr::EntType => test.test(node.ent_type.map_or("", |e| graph.resolve(e))),
            },
            Predicate::And(all) => all.iter().all(|p| p.matches(graph, node)),
        }
    }
}

pub fn merge_predicates(a: Predicate, b: Predicate) -> Predicate {
    match (a, b) {
        (x, Predicate::Any) | (Predicate::Any, x) => x,
        (Predicate::And(mut xs), Predicate::And(ys)) => {
            xs.extend(ys);
            Predicate::And(xs)
        }
        (Predicate::And(mut xs), y) => {
            xs.push(y);
            Predicate::And(xs)
        }
        (x, Predicate::And(ys)) => {
            let mut all = vec![x];
            all.extend(ys);
            Predicate::And(all)
        }
        (x, y) => Predicate::And(vec![x, y]),
    }
}

/// Relation between a pattern-node and its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    /// Anchor is the direct governor (`>`)
    Child,
    /// Anchor reaches the node through one or more edges (`>>`)
    Descendant,
    /// Node is the direct governor of the anchor (`<`)
    Head,
    /// Node reaches the anchor through one or more edges (`<<`)
    Ancestor,
}

impl RelOp {
    pub fn parse(op: &str) -> Result<Self, PatternError> {
        match op {
            ">" => Ok(RelOp::Child),
            ">>" => Ok(RelOp::Descendant),
            "<" => Ok(RelOp::Head),
            "<<" => Ok(RelOp::Ancestor),
            other => Err(PatternError::UnknownRelOp(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternNode {
    pub name: String,
    /// Earlier node this one is reached from; `None` for the anchor
    pub anchor: Option<(PatternNodeId, RelOp)>,
    pub predicate: Predicate,
}

/// An anchored pattern, nodes in topological order
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    nodes: Vec<PatternNode>,
}

impl Pattern {
    /// Start a pattern with its anchor node
    pub fn anchored(name: &str, predicate: Predicate) -> Self {
        Self {
            nodes: vec![PatternNode {
                name: name.to_string(),
                anchor: None,
                predicate,
            }],
        }
    }

    /// Add a node related to the already declared node `anchor`
    pub fn with(
        mut self,
        name: &str,
        anchor: &str,
        op: RelOp,
        predicate: Predicate,
    ) -> Result<Self, PatternError> {
        if self.position(name).is_some() {
            return Err(PatternError::DuplicateName(name.to_string()));
        }
        let anchor_id = self
            .position(anchor)
            .ok_or_else(|| PatternError::UnknownAnchor {
                node: name.to_string(),
                anchor: anchor.to_string(),
            })?;
        self.nodes.push(PatternNode {
            name: name.to_string(),
            anchor: Some((anchor_id, op)),
            predicate,
        });
        Ok(self)
    }

    pub fn position(&self, name: &str) -> Option<PatternNodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn nodes(&self) -> &[PatternNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }
}
