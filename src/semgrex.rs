//! Semgrex pattern index
//!
//! Loads a user-supplied JSON catalog for matching against pre-parsed
//! CoNLL-U. The file maps family names to ordered node lists:
//!
//! ```json
//! {
//!   "sov": [
//!     {"RIGHT_ID": "verb", "RIGHT_ATTRS": {"POS": "VERB"}},
//!     {"LEFT_ID": "verb", "REL_OP": ">", "RIGHT_ID": "subject",
//!      "RIGHT_ATTRS": {"DEP": {"IN": ["nsubj", "nsubj:pass"]}}}
//!   ]
//! }
//! ```
//!
//! The output column list is derived once at load time, family by family in
//! file order, six columns per node.

use crate::graph::{Graph, NodeId};
use crate::matcher::Matcher;
use crate::pattern::{Attr, Pattern, PatternError, Predicate, RelOp, ValueTest};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SemgrexError {
    #[error("Failed to read pattern file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{family}: pattern has no nodes")]
    Empty { family: String },

    #[error("{family}.{node}: only the first node may omit LEFT_ID and REL_OP")]
    MissingAnchor { family: String, node: String },

    #[error("{family}.{node}: the first node cannot have LEFT_ID or REL_OP")]
    AnchoredRoot { family: String, node: String },

    #[error("{family}.{node}: unknown attribute {key}")]
    UnknownAttribute {
        family: String,
        node: String,
        key: String,
    },

    #[error("{family}.{node}: unsupported value for {key}")]
    BadValue {
        family: String,
        node: String,
        key: String,
    },

    #[error("{family}: {source}")]
    Pattern {
        family: String,
        #[source]
        source: PatternError,
    },
}

/// Per-node output columns, in order
pub const NODE_COLUMNS: [&str; 6] = ["id", "lemma", "pos", "deprel", "ent_type", "in_noun_phrase"];

/// Dependency labels that keep a dependent inside its nominal head's phrase
const NP_INTERNAL: [&str; 11] = [
    "det", "amod", "compound", "nummod", "poss", "nmod", "case", "flat", "appos", "acl", "clf",
];

const NOMINAL: [&str; 3] = ["NOUN", "PROPN", "PRON"];

#[derive(Debug, Deserialize)]
struct NodeSpec {
    #[serde(rename = "RIGHT_ID")]
    right_id: String,
    #[serde(rename = "RIGHT_ATTRS", default)]
    right_attrs: Map<String, Value>,
    #[serde(rename = "LEFT_ID")]
    left_id: Option<String>,
    #[serde(rename = "REL_OP")]
    rel_op: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SemgrexFamily {
    pub name: String,
    pub pattern: Pattern,
}

/// Named patterns plus their derived output columns; immutable once loaded
#[derive(Debug, Clone)]
pub struct SemgrexIndex {
    families: Vec<SemgrexFamily>,
    columns: Vec<String>,
    /// First column of each family within `columns`
    offsets: Vec<usize>,
}

impl SemgrexIndex {
    pub fn load(path: &Path) -> Result<Self, SemgrexError> {
        let text = fs::read_to_string(path).map_err(|source| SemgrexError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SemgrexError> {
        let raw: Map<String, Value> = serde_json::from_str(text)?;

        let mut families = Vec::with_capacity(raw.len());
        for (name, nodes) in raw {
            let specs: Vec<NodeSpec> = serde_json::from_value(nodes)?;
            let pattern = build_pattern(&name, &specs)?;
            families.push(SemgrexFamily { name, pattern });
        }

        let mut columns = Vec::new();
        let mut offsets = Vec::with_capacity(families.len());
        for family in &families {
            offsets.push(columns.len());
            for node in family.pattern.names() {
                for suffix in NODE_COLUMNS {
                    columns.push(format!("{}_{}_{}", family.name, node, suffix));
                }
            }
        }

        Ok(Self {
            families,
            columns,
            offsets,
        })
    }

    pub fn families(&self) -> &[SemgrexFamily] {
        &self.families
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// One row per match, each aligned with [`Self::columns`]; only the
    /// matching family's columns are filled
    pub fn rows(&self, graph: &Graph) -> Vec<Vec<Option<String>>> {
        let matcher = Matcher::new(graph);
        let mut rows = Vec::new();

        for (family, &offset) in self.families.iter().zip(&self.offsets) {
            for binding in matcher.find(&family.pattern) {
                let mut row = vec![None; self.columns.len()];
                for (slot, &node_id) in binding.iter().enumerate() {
                    let start = offset + slot * NODE_COLUMNS.len();
                    for (cell, value) in row[start..start + NODE_COLUMNS.len()]
                        .iter_mut()
                        .zip(node_cells(graph, node_id))
                    {
                        *cell = value;
                    }
                }
                rows.push(row);
            }
        }

        rows
    }
}

fn node_cells(graph: &Graph, id: NodeId) -> [Option<String>; 6] {
    let Some(node) = graph.node(id) else {
        return Default::default();
    };
    [
        Some(id.to_string()),
        Some(graph.resolve(node.lemma).to_string()),
        Some(graph.resolve(node.upos).to_string()),
        Some(graph.resolve(node.deprel).to_string()),
        node.ent_type.map(|e| graph.resolve(e).to_string()),
        Some(in_noun_phrase(graph, id).to_string()),
    ]
}

/// A node is inside a noun phrase if it is nominal itself, or hangs off a
/// nominal head through a phrase-internal label
pub fn in_noun_phrase(graph: &Graph, id: NodeId) -> bool {
    let Some(node) = graph.node(id) else {
        return false;
    };
    if NOMINAL.contains(&graph.resolve(node.upos)) {
        return true;
    }
    let deprel = graph.resolve(node.deprel);
    let base = deprel.split(':').next().unwrap_or(deprel);
    node.head
        .and_then(|head| graph.upos(head))
        .is_some_and(|upos| NOMINAL.contains(&upos) && NP_INTERNAL.contains(&base))
}

fn build_pattern(family: &str, specs: &[NodeSpec]) -> Result<Pattern, SemgrexError> {
    let Some((first, rest)) = specs.split_first() else {
        return Err(SemgrexError::Empty {
            family: family.to_string(),
        });
    };
    if first.left_id.is_some() || first.rel_op.is_some() {
        return Err(SemgrexError::AnchoredRoot {
            family: family.to_string(),
            node: first.right_id.clone(),
        });
    }

    let mut pattern = Pattern::anchored(&first.right_id, predicate(family, first)?);
    for spec in rest {
        let (Some(left), Some(op)) = (&spec.left_id, &spec.rel_op) else {
            return Err(SemgrexError::MissingAnchor {
                family: family.to_string(),
                node: spec.right_id.clone(),
            });
        };
        let wrap = |source| SemgrexError::Pattern {
            family: family.to_string(),
            source,
        };
        let op = RelOp::parse(op).map_err(wrap)?;
        pattern = pattern
            .with(&spec.right_id, left, op, predicate(family, spec)?)
            .map_err(wrap)?;
    }

    Ok(pattern)
}

fn predicate(family: &str, spec: &NodeSpec) -> Result<Predicate, SemgrexError> {
    let mut predicate = Predicate::Any;

    for (key, value) in &spec.right_attrs {
        let attr = match key.as_str() {
            "ORTH" | "TEXT" => Attr::Form,
            "LOWER" => Attr::Lower,
            "LEMMA" => Attr::Lemma,
            "POS" => Attr::Upos,
            "TAG" => Attr::Xpos,
            "DEP" => Attr::DepRel,
            "MORPH" => Attr::Feats,
            "ENT_TYPE" => Attr::EntType,
            _ => {
                return Err(SemgrexError::UnknownAttribute {
                    family: family.to_string(),
                    node: spec.right_id.clone(),
                    key: key.clone(),
                });
            }
        };
        let bad_value = || SemgrexError::BadValue {
            family: family.to_string(),
            node: spec.right_id.clone(),
            key: key.clone(),
        };
        let test = value_test(value)
            .map_err(|source| SemgrexError::Pattern {
                family: family.to_string(),
                source,
            })?
            .ok_or_else(bad_value)?;
        predicate = predicate.and(Predicate::Attr(attr, test));
    }

    Ok(predicate)
}

/// `Ok(None)` when the value has an unsupported shape
fn value_test(value: &Value) -> Result<Option<ValueTest>, PatternError> {
    match value {
        Value::String(s) => Ok(Some(ValueTest::Literal(s.clone()))),
        Value::Object(ops) if ops.len() == 1 => {
            let Some((op, arg)) = ops.iter().next() else {
                return Ok(None);
            };
            match (op.as_str(), arg) {
                ("IN", Value::Array(items)) => Ok(strings(items).map(ValueTest::In)),
                ("NOT_IN", Value::Array(items)) => Ok(strings(items).map(ValueTest::NotIn)),
                ("REGEX", Value::String(re)) => ValueTest::regex(re).map(Some),
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

fn strings(items: &[Value]) -> Option<Vec<String>> {
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conllu::parse_graph;
    use crate::graph::Vocab;

    const PATTERNS: &str = r#"{
        "sov": [
            {"RIGHT_ID": "verb", "RIGHT_ATTRS": {"POS": "VERB"}},
            {"LEFT_ID": "verb", "REL_OP": ">", "RIGHT_ID": "subject",
             "RIGHT_ATTRS": {"DEP": {"IN": ["nsubj", "nsubj:pass"]}}},
            {"LEFT_ID": "verb", "REL_OP": ">", "RIGHT_ID": "object",
             "RIGHT_ATTRS": {"DEP": "obj"}}
        ],
        "adjective": [
            {"RIGHT_ID": "noun", "RIGHT_ATTRS": {"LEMMA": {"REGEX": "^m"}}},
            {"LEFT_ID": "noun", "REL_OP": ">>", "RIGHT_ID": "adj",
             "RIGHT_ATTRS": {"POS": "ADJ", "DEP": {"NOT_IN": ["conj"]}}}
        ]
    }"#;

    const SENTENCE: &str = "1\tThe\tthe\tDET\t_\t_\t2\tdet\t_\t_
2\tcat\tcat\tNOUN\t_\t_\t3\tnsubj\t_\tNER=ANIMAL
3\teats\teat\tVERB\t_\t_\t0\troot\t_\t_
4\tsmall\tsmall\tADJ\t_\t_\t5\tamod\t_\t_
5\tmice\tmouse\tNOUN\t_\t_\t3\tobj\t_\t_
";

    #[test]
    fn test_columns_follow_file_order() {
        let index = SemgrexIndex::from_json(PATTERNS).unwrap();

        assert_eq!(index.columns().len(), (3 + 2) * 6);
        assert_eq!(index.columns()[0], "sov_verb_id");
        assert_eq!(index.columns()[6], "sov_subject_id");
        assert_eq!(index.columns()[17], "sov_object_in_noun_phrase");
        assert_eq!(index.columns()[18], "adjective_noun_id");
        assert_eq!(index.columns()[29], "adjective_adj_in_noun_phrase");
    }

    #[test]
    fn test_column_derivation_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.json");
        fs::write(&path, PATTERNS).unwrap();

        let a = SemgrexIndex::load(&path).unwrap();
        let b = SemgrexIndex::load(&path).unwrap();
        assert_eq!(a.columns(), b.columns());
    }

    #[test]
    fn test_rows_fill_only_matching_family() {
        let graph = parse_graph(SENTENCE, &Vocab::new()).unwrap();
        let index = SemgrexIndex::from_json(PATTERNS).unwrap();
        let rows = index.rows(&graph);

        assert_eq!(rows.len(), 2);
        let sov = &rows[0];
        assert_eq!(sov[0].as_deref(), Some("2"));
        assert_eq!(sov[1].as_deref(), Some("eat"));
        assert_eq!(sov[7].as_deref(), Some("cat"));
        assert_eq!(sov[10].as_deref(), Some("ANIMAL"));
        assert_eq!(sov[11].as_deref(), Some("true"));
        assert_eq!(sov[5].as_deref(), Some("false"));
        assert!(sov[18..].iter().all(Option::is_none));

        let adjective = &rows[1];
        assert!(adjective[..18].iter().all(Option::is_none));
        assert_eq!(adjective[18].as_deref(), Some("4"));
        assert_eq!(adjective[24].as_deref(), Some("3"));
        // amod under a nominal head
        assert_eq!(adjective[29].as_deref(), Some("true"));
    }

    #[test]
    fn test_invalid_catalogs() {
        let err = SemgrexIndex::from_json(r#"{"p": []}"#).unwrap_err();
        assert!(matches!(err, SemgrexError::Empty { .. }));

        let err = SemgrexIndex::from_json(
            r#"{"p": [{"RIGHT_ID": "a"}, {"RIGHT_ID": "b", "RIGHT_ATTRS": {}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SemgrexError::MissingAnchor { .. }));

        let err = SemgrexIndex::from_json(
            r#"{"p": [{"RIGHT_ID": "a", "RIGHT_ATTRS": {"SHAPE": "Xxx"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SemgrexError::UnknownAttribute { .. }));

        let err = SemgrexIndex::from_json(
            r#"{"p": [{"RIGHT_ID": "a"}, {"LEFT_ID": "a", "REL_OP": ".", "RIGHT_ID": "b"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SemgrexError::Pattern {
                source: PatternError::UnknownRelOp(_),
                ..
            }
        ));

        let err = SemgrexIndex::from_json(
            r#"{"p": [{"RIGHT_ID": "a", "RIGHT_ATTRS": {"POS": 3}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SemgrexError::BadValue { .. }));

        assert!(matches!(
            SemgrexIndex::from_json("[1, 2]"),
            Err(SemgrexError::Json(_))
        ));
    }

    #[test]
    fn test_in_noun_phrase() {
        let graph = parse_graph(SENTENCE, &Vocab::new()).unwrap();
        assert!(in_noun_phrase(&graph, 0)); // det of cat
        assert!(in_noun_phrase(&graph, 1));
        assert!(!in_noun_phrase(&graph, 2));
        assert!(in_noun_phrase(&graph, 3));
    }
}
