//! Inverted indices for efficient candidate lookup
//!
//! Built once per graph, used to seed anchor candidates so the matcher does
//! not have to test every node of a long document against the anchor.

use crate::graph::{Graph, NodeId, Sym};
use crate::pattern::{Attr, Predicate, ValueTest};
use rustc_hash::FxHashMap;

/// Inverted index for graph nodes
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    /// Index by lowercased lemma
    by_lemma: FxHashMap<String, Vec<NodeId>>,
    /// Index by POS tag
    by_upos: FxHashMap<Sym, Vec<NodeId>>,
    /// Index by dependency relation
    by_deprel: FxHashMap<Sym, Vec<NodeId>>,
}

impl GraphIndex {
    /// Build an index from a graph
    ///
    /// Posting lists are in ascending node order.
    pub fn build(graph: &Graph) -> Self {
        let mut index = Self::default();

        for node in &graph.nodes {
            index
                .by_lemma
                .entry(graph.resolve(node.lemma).to_lowercase())
                .or_default()
                .push(node.id);
            index.by_upos.entry(node.upos).or_default().push(node.id);
            index.by_deprel.entry(node.deprel).or_default().push(node.id);
        }

        index
    }

    /// Get candidate nodes by lemma, ignoring case
    pub fn get_by_lemma(&self, lemma: &str) -> &[NodeId] {
        self.by_lemma
            .get(&lemma.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get candidate nodes by POS tag
    pub fn get_by_upos(&self, graph: &Graph, upos: &str) -> &[NodeId] {
        graph
            .vocab()
            .get(upos)
            .and_then(|sym| self.by_upos.get(&sym))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get candidate nodes by dependency relation
    pub fn get_by_deprel(&self, graph: &Graph, deprel: &str) -> &[NodeId] {
        graph
            .vocab()
            .get(deprel)
            .and_then(|sym| self.by_deprel.get(&sym))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nodes that may satisfy `predicate`, ascending
    ///
    /// Returns `None` when the predicate has no indexable part; callers
    /// then scan every node. The result is a superset of the matching
    /// nodes and still has to be checked against the full predicate.
    pub fn candidates(&self, graph: &Graph, predicate: &Predicate) -> Option<Vec<NodeId>> {
        match predicate {
            Predicate::Attr(Attr::Upos, ValueTest::Literal(upos)) => {
                Some(self.get_by_upos(graph, upos).to_vec())
            }
            Predicate::Attr(Attr::Lemma, ValueTest::IgnoreCase(lemma)) => {
                Some(self.get_by_lemma(lemma).to_vec())
            }
            Predicate::Attr(Attr::DepRel, ValueTest::Literal(deprel)) => {
                Some(self.get_by_deprel(graph, deprel).to_vec())
            }
            Predicate::Attr(Attr::DepRel, ValueTest::In(deprels)) => {
                let mut ids: Vec<NodeId> = deprels
                    .iter()
                    .flat_map(|d| self.get_by_deprel(graph, d).iter().copied())
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                Some(ids)
            }
            // Lemma first (most selective), then whatever else is indexable
            Predicate::And(parts) => parts
                .iter()
                .filter(|p| matches!(p, Predicate::Attr(Attr::Lemma, _)))
                .chain(parts.iter())
                .find_map(|p| self.candidates(graph, p)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Token, Vocab};

    fn create_test_graph() -> Graph {
        let mut graph = Graph::new(Vocab::new());
        graph.add_token(Token::new("eats", "eat", "VERB", "root"));
        graph.add_token(Token::new("Cat", "Cat", "NOUN", "nsubj"));
        graph.add_token(Token::new("mouse", "mouse", "NOUN", "obj"));
        graph.set_head(1, 0).unwrap();
        graph.set_head(2, 0).unwrap();
        graph
    }

    #[test]
    fn test_index_building() {
        let graph = create_test_graph();
        let index = GraphIndex::build(&graph);

        assert_eq!(index.get_by_lemma("cat"), &[1]);
        assert_eq!(index.get_by_lemma("CAT"), &[1]);
        assert_eq!(index.get_by_upos(&graph, "NOUN"), &[1, 2]);
        assert_eq!(index.get_by_deprel(&graph, "obj"), &[2]);
        assert!(index.get_by_upos(&graph, "ADJ").is_empty());
    }

    #[test]
    fn test_candidates_from_predicate() {
        let graph = create_test_graph();
        let index = GraphIndex::build(&graph);

        let verb = Predicate::upos("VERB");
        assert_eq!(index.candidates(&graph, &verb), Some(vec![0]));

        let args = Predicate::deprel_in(&["obj", "nsubj"]);
        assert_eq!(index.candidates(&graph, &args), Some(vec![1, 2]));

        let noun_mouse = Predicate::upos("NOUN").and(Predicate::lemma_is("Mouse"));
        assert_eq!(index.candidates(&graph, &noun_mouse), Some(vec![2]));

        assert_eq!(index.candidates(&graph, &Predicate::Any), None);
    }
}
