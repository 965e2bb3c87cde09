//! Dependency graph data structures
//!
//! A parsed document is a forest of token nodes, one tree per sentence,
//! linked by governor -> dependent edges. Node strings are interned in a
//! [`Vocab`] shared by every graph of a run, so repeated lemmas, tags and
//! labels cost one symbol each.

use lasso::{Spur, ThreadedRodeo};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Index of a node within its document (token position, 0-based)
pub type NodeId = usize;

/// Interned string symbol
pub type Sym = Spur;

/// Shared string pool for node attributes
#[derive(Clone)]
pub struct Vocab(Arc<ThreadedRodeo>);

impl Vocab {
    pub fn new() -> Self {
        Self(Arc::new(ThreadedRodeo::new()))
    }

    #[inline]
    pub fn intern(&self, s: &str) -> Sym {
        self.0.get_or_intern(s)
    }

    #[inline]
    pub fn resolve(&self, sym: Sym) -> &str {
        self.0.resolve(&sym)
    }

    /// Look up a symbol without interning
    #[inline]
    pub fn get(&self, s: &str) -> Option<Sym> {
        self.0.get(s)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Vocab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vocab").field("len", &self.len()).finish()
    }
}

/// Borrowed token attributes used to add a node to a graph
#[derive(Debug, Clone, Copy)]
pub struct Token<'a> {
    pub form: &'a str,
    pub lemma: &'a str,
    pub upos: &'a str,
    pub xpos: &'a str,
    pub feats: &'a str,
    pub deprel: &'a str,
    pub ent_type: Option<&'a str>,
}

impl<'a> Token<'a> {
    pub fn new(form: &'a str, lemma: &'a str, upos: &'a str, deprel: &'a str) -> Self {
        Self {
            form,
            lemma,
            upos,
            xpos: "_",
            feats: "_",
            deprel,
            ent_type: None,
        }
    }

    pub fn with_feats(mut self, feats: &'a str) -> Self {
        self.feats = feats;
        self
    }

    pub fn with_xpos(mut self, xpos: &'a str) -> Self {
        self.xpos = xpos;
        self
    }

    pub fn with_ent_type(mut self, ent_type: &'a str) -> Self {
        self.ent_type = Some(ent_type);
        self
    }
}

/// A token node in a dependency graph
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Sentence number within the document
    pub sentence: usize,
    pub form: Sym,
    pub lemma: Sym,
    pub upos: Sym,
    pub xpos: Sym,
    /// Morphological features string, `_` when empty
    pub feats: Sym,
    pub deprel: Sym,
    pub ent_type: Option<Sym>,
    pub head: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    NoSuchNode(NodeId),

    #[error("node {child} and head {head} are in different sentences")]
    CrossSentence { child: NodeId, head: NodeId },

    #[error("cycle through node {0}")]
    Cycle(NodeId),

    #[error("node {0} already has a governor")]
    MultipleHeads(NodeId),
}

/// A parsed document: one dependency tree per sentence
#[derive(Debug, Clone)]
pub struct Graph {
    vocab: Vocab,
    pub nodes: Vec<Node>,
    pub text: Option<String>,
    n_sentences: usize,
}

impl Graph {
    pub fn new(vocab: Vocab) -> Self {
        Self {
            vocab,
            nodes: Vec::new(),
            text: None,
            n_sentences: 1,
        }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn sentence_count(&self) -> usize {
        if self.nodes.is_empty() { 0 } else { self.n_sentences }
    }

    /// Begin a new sentence; later tokens belong to it
    pub fn start_sentence(&mut self) {
        if !self.nodes.is_empty() && self.current_sentence_is_open() {
            self.n_sentences += 1;
        }
    }

    fn current_sentence_is_open(&self) -> bool {
        self.nodes
            .last()
            .is_some_and(|node| node.sentence + 1 == self.n_sentences)
    }

    /// Append a token to the current sentence
    pub fn add_token(&mut self, token: Token<'_>) -> NodeId {
        let id = self.nodes.len();
        let node = Node {
            id,
            sentence: self.n_sentences - 1,
            form: self.vocab.intern(token.form),
            lemma: self.vocab.intern(token.lemma),
            upos: self.vocab.intern(token.upos),
            xpos: self.vocab.intern(token.xpos),
            feats: self.vocab.intern(token.feats),
            deprel: self.vocab.intern(token.deprel),
            ent_type: token.ent_type.map(|e| self.vocab.intern(e)),
            head: None,
            children: Vec::new(),
        };
        self.nodes.push(node);
        id
    }

    /// Attach `child` to `head`
    ///
    /// Children are kept in the order they were attached.
    pub fn set_head(&mut self, child: NodeId, head: NodeId) -> Result<(), GraphError> {
        let child_sentence = self.node(child).ok_or(GraphError::NoSuchNode(child))?.sentence;
        let head_sentence = self.node(head).ok_or(GraphError::NoSuchNode(head))?.sentence;
        if child_sentence != head_sentence {
            return Err(GraphError::CrossSentence { child, head });
        }
        // Attaching below one of its own descendants would close a cycle
        let mut current = Some(head);
        let mut steps = 0;
        while let Some(node) = current {
            if node == child || steps > self.nodes.len() {
                return Err(GraphError::Cycle(child));
            }
            steps += 1;
            current = self.nodes[node].head;
        }
        if self.nodes[child].head.is_some() {
            return Err(GraphError::MultipleHeads(child));
        }
        self.nodes[child].head = Some(head);
        self.nodes[head].children.push(child);
        Ok(())
    }

    /// Check that governor edges form a forest (every node reaches a root)
    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        for start in 0..self.nodes.len() {
            let mut current = start;
            let mut steps = 0;
            while let Some(head) = self.nodes[current].head {
                steps += 1;
                if steps > self.nodes.len() {
                    return Err(GraphError::Cycle(start));
                }
                current = head;
            }
        }
        Ok(())
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes without a governor, in index order
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| n.head.is_none()).map(|n| n.id)
    }

    #[inline]
    pub fn resolve(&self, sym: Sym) -> &str {
        self.vocab.resolve(sym)
    }

    pub fn form(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| self.resolve(n.form))
    }

    pub fn lemma(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| self.resolve(n.lemma))
    }

    pub fn upos(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| self.resolve(n.upos))
    }

    pub fn deprel(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| self.resolve(n.deprel))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn head(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.head)
    }

    /// All nodes reachable from `id` through one or more edges,
    /// in ascending index order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        while let Some(next) = stack.pop() {
            if out.len() > self.nodes.len() {
                break;
            }
            out.push(next);
            stack.extend_from_slice(self.children(next));
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Governors of `id` up to the root, in ascending index order
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.head(id);
        while let Some(head) = current {
            if out.len() > self.nodes.len() {
                break;
            }
            out.push(head);
            current = self.head(head);
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// runs <- dog <- big ; runs <- quickly
    fn create_test_graph() -> Graph {
        let mut graph = Graph::new(Vocab::new());
        graph.add_token(Token::new("runs", "run", "VERB", "root"));
        graph.add_token(Token::new("dog", "dog", "NOUN", "nsubj"));
        graph.add_token(Token::new("quickly", "quickly", "ADV", "advmod"));
        graph.add_token(Token::new("big", "big", "ADJ", "amod"));
        graph.set_head(1, 0).unwrap();
        graph.set_head(2, 0).unwrap();
        graph.set_head(3, 1).unwrap();
        graph
    }

    #[test]
    fn test_graph_creation() {
        let graph = create_test_graph();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.head(1), Some(0));
        assert_eq!(graph.children(0), &[1, 2]);
        assert_eq!(graph.roots().collect::<Vec<_>>(), vec![0]);
        assert_eq!(graph.lemma(3), Some("big"));
        assert_eq!(graph.lemma(9), None);
    }

    #[test]
    fn test_descendants_sorted() {
        let graph = create_test_graph();
        assert_eq!(graph.descendants(0), vec![1, 2, 3]);
        assert_eq!(graph.descendants(1), vec![3]);
        assert!(graph.descendants(3).is_empty());
        assert_eq!(graph.ancestors(3), vec![0, 1]);
    }

    #[test]
    fn test_vocab_is_shared() {
        let vocab = Vocab::new();
        let mut a = Graph::new(vocab.clone());
        let mut b = Graph::new(vocab.clone());
        a.add_token(Token::new("cats", "cat", "NOUN", "root"));
        b.add_token(Token::new("cat", "cat", "NOUN", "root"));
        assert_eq!(a.nodes[0].lemma, b.nodes[0].lemma);
        assert!(vocab.get("cat").is_some());
    }

    #[test]
    fn test_sentences_and_cross_sentence_edges() {
        let mut graph = Graph::new(Vocab::new());
        graph.add_token(Token::new("Hi", "hi", "INTJ", "root"));
        graph.start_sentence();
        graph.start_sentence(); // no empty sentences
        graph.add_token(Token::new("Go", "go", "VERB", "root"));

        assert_eq!(graph.sentence_count(), 2);
        assert_eq!(graph.nodes[1].sentence, 1);
        assert_eq!(
            graph.set_head(1, 0),
            Err(GraphError::CrossSentence { child: 1, head: 0 })
        );
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = Graph::new(Vocab::new());
        graph.add_token(Token::new("a", "a", "X", "dep"));
        graph.add_token(Token::new("b", "b", "X", "dep"));
        graph.set_head(0, 1).unwrap();
        assert_eq!(graph.set_head(1, 0), Err(GraphError::Cycle(1)));
        assert_eq!(graph.set_head(0, 0), Err(GraphError::Cycle(0)));
        assert!(graph.check_acyclic().is_ok());

        // Edges written straight into the node table bypass set_head
        graph.nodes[1].head = Some(0);
        graph.nodes[0].children.push(1);
        assert!(matches!(graph.check_acyclic(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn test_longer_cycle_rejected() {
        // c <- b <- a, then a <- c would loop
        let mut graph = Graph::new(Vocab::new());
        for form in ["a", "b", "c"] {
            graph.add_token(Token::new(form, form, "X", "dep"));
        }
        graph.set_head(1, 0).unwrap();
        graph.set_head(2, 1).unwrap();
        assert_eq!(graph.set_head(0, 2), Err(GraphError::Cycle(0)));
        assert_eq!(graph.head(0), None);
        assert_eq!(graph.descendants(0), vec![1, 2]);
    }

    #[test]
    fn test_descendants_terminate_on_cyclic_table() {
        let mut graph = Graph::new(Vocab::new());
        for form in ["a", "b", "c"] {
            graph.add_token(Token::new(form, form, "X", "dep"));
        }
        graph.set_head(1, 0).unwrap();
        graph.set_head(2, 1).unwrap();
        graph.nodes[0].head = Some(2);
        graph.nodes[2].children.push(0);

        let reached = graph.descendants(0);
        assert!(reached.len() <= graph.len() + 1);
        assert!(reached.contains(&2));
    }
}
