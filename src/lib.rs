//! depmatch: dependency-pattern extraction at corpus scale
//!
//! Matches small anchored patterns (subject-verb-object triples, negated
//! triples, target-modifier pairs) against dependency parses and streams
//! the resulting relation records from and to delimited files.
//! Core implementation in Rust with optional Python bindings.

// Core modules
pub mod compiler; // Built-in pattern catalog
pub mod conllu; // CoNLL-U graph interchange
pub mod graph; // Dependency graph data structures
pub mod index; // Inverted indices for candidate lookup
pub mod matcher; // Backtracking pattern matcher
pub mod pattern; // Patterns, predicates and relation operators
pub mod profile; // Per-language label sets
pub mod projector; // Matches to relation records
pub mod semgrex; // User-supplied JSON pattern catalogs

// Pipeline and collaborators
pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod tabular;

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use compiler::{Catalog, FamilyKind, compile_catalog};
pub use conllu::{parse_graph, write_graph};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use extract::{CatalogExtractor, Extractor};
pub use graph::{Graph, Node, NodeId, Vocab};
pub use matcher::{CatalogMatch, Matcher};
pub use parser::{CommandParser, ConlluParser, DependencyParser, Document};
pub use pattern::{Pattern, Predicate, RelOp};
pub use pipeline::{CancelToken, Pipeline, RunSummary};
pub use profile::LanguageProfile;
pub use projector::{Projector, RelationRecord};
pub use semgrex::SemgrexIndex;
