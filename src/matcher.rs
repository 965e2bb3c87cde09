//! Pattern matching over dependency graphs
//!
//! Pattern-nodes are bound in pattern order. The anchor is tried against
//! every graph node that satisfies its predicate; each later node is tried
//! against the nodes related to its already bound anchor. Candidates are
//! always visited in ascending node order, so for a fixed graph and
//! pattern the sequence of matches is reproducible.
//!
//! A graph node is bound to at most one pattern-node within a match.

use crate::compiler::{Catalog, FamilyKind};
use crate::graph::{Graph, NodeId};
use crate::index::GraphIndex;
use crate::pattern::{Pattern, RelOp};
use rustc_hash::FxHashSet;

/// Node ids bound by one match, in pattern order
pub type Binding = Vec<NodeId>;

/// A match of a catalog family, tagged with the variant that fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMatch {
    pub kind: FamilyKind,
    /// Index into the family's variants
    pub variant: usize,
    pub nodes: Binding,
}

impl CatalogMatch {
    pub fn arity(&self) -> usize {
        self.nodes.len()
    }
}

/// Matches patterns against one graph
pub struct Matcher<'g> {
    graph: &'g Graph,
    index: GraphIndex,
}

impl<'g> Matcher<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            index: GraphIndex::build(graph),
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// All bindings of `pattern`, in deterministic order
    pub fn find(&self, pattern: &Pattern) -> Vec<Binding> {
        let mut matches = Vec::new();
        let Some(anchor) = pattern.nodes().first() else {
            return matches;
        };

        let candidates = self
            .index
            .candidates(self.graph, &anchor.predicate)
            .unwrap_or_else(|| (0..self.graph.len()).collect());

        let mut bindings = Vec::with_capacity(pattern.len());
        for node_id in candidates {
            let Some(node) = self.graph.node(node_id) else {
                continue;
            };
            if !anchor.predicate.matches(self.graph, node) {
                continue;
            }
            bindings.push(node_id);
            self.extend(pattern, &mut bindings, &mut matches);
            bindings.pop();
        }

        matches
    }

    /// Bind the next pattern-node, recursing until the pattern is complete
    fn extend(&self, pattern: &Pattern, bindings: &mut Binding, matches: &mut Vec<Binding>) {
        let depth = bindings.len();
        let Some(pattern_node) = pattern.nodes().get(depth) else {
            matches.push(bindings.clone());
            return;
        };
        let Some((anchor, op)) = pattern_node.anchor else {
            return;
        };

        for candidate in self.related(bindings[anchor], op) {
            if bindings.contains(&candidate) {
                continue;
            }
            let Some(node) = self.graph.node(candidate) else {
                continue;
            };
            if pattern_node.predicate.matches(self.graph, node) {
                bindings.push(candidate);
                self.extend(pattern, bindings, matches);
                bindings.pop();
            }
        }
    }

    /// Nodes standing in relation `op` to `from`, ascending
    fn related(&self, from: NodeId, op: RelOp) -> Vec<NodeId> {
        match op {
            RelOp::Child => {
                let mut children = self.graph.children(from).to_vec();
                children.sort_unstable();
                children
            }
            RelOp::Descendant => self.graph.descendants(from),
            RelOp::Head => self.graph.head(from).into_iter().collect(),
            RelOp::Ancestor => self.graph.ancestors(from),
        }
    }

    /// Match every family of a catalog
    ///
    /// Within a family, a node tuple reached by several variants is reported
    /// once, for the first variant. A negated SOV triple is reported once,
    /// with its first negation marker, however many markers the verb has.
    /// A three-node SOV match whose verb, subject and object also appear in
    /// a negated SOV match is dropped in favour of the negated one.
    pub fn find_catalog(&self, catalog: &Catalog) -> Vec<CatalogMatch> {
        let mut matches = Vec::new();

        for family in catalog.families() {
            let mut seen: FxHashSet<Binding> = FxHashSet::default();
            for (variant_idx, variant) in family.variants.iter().enumerate() {
                for nodes in self.find(&variant.pattern) {
                    let key = match family.kind {
                        FamilyKind::NegatedSov => nodes[..3].to_vec(),
                        _ => nodes.clone(),
                    };
                    if seen.insert(key) {
                        matches.push(CatalogMatch {
                            kind: family.kind,
                            variant: variant_idx,
                            nodes,
                        });
                    }
                }
            }
        }

        let negated: FxHashSet<&[NodeId]> = matches
            .iter()
            .filter(|m| m.kind == FamilyKind::NegatedSov)
            .map(|m| &m.nodes[..3])
            .collect();
        if negated.is_empty() {
            return matches;
        }
        let subsumed: Vec<bool> = matches
            .iter()
            .map(|m| m.kind == FamilyKind::Sov && negated.contains(m.nodes.as_slice()))
            .collect();
        matches
            .into_iter()
            .zip(subsumed)
            .filter_map(|(m, drop)| (!drop).then_some(m))
            .collect()
    }
}
