//! Graph to output-row extraction
//!
//! An [`Extractor`] owns a fixed column list and turns each parsed graph
//! into zero or more rows aligned with it. The pipeline only talks to this
//! trait, so the built-in catalog and a loaded semgrex index drive the same
//! batch loop.

use crate::compiler::{Catalog, compile_catalog};
use crate::graph::Graph;
use crate::matcher::Matcher;
use crate::pattern::PatternError;
use crate::profile::LanguageProfile;
use crate::projector::{ProjectionError, Projector, RECORD_COLUMNS, RelationRecord};
use crate::semgrex::SemgrexIndex;
use tracing::warn;

/// One output row; `None` cells are written as the absent marker
pub type Row = Vec<Option<String>>;

pub trait Extractor {
    /// Columns appended after the identifier column
    fn columns(&self) -> Vec<String>;

    /// Rows for one graph, in match order. A failed record does not stop
    /// the remaining ones.
    fn rows(&self, graph: &Graph) -> Vec<Result<Row, ProjectionError>>;

    /// Rows that projected cleanly; failed records are logged and dropped
    fn valid_rows(&self, graph: &Graph) -> Vec<Row> {
        let mut rows = Vec::new();
        for row in self.rows(graph) {
            match row {
                Ok(cells) => rows.push(cells),
                Err(e) => warn!(error = %e, "skipping malformed record"),
            }
        }
        rows
    }
}

/// Built-in catalog matcher and projector
#[derive(Debug, Clone)]
pub struct CatalogExtractor {
    catalog: Catalog,
    profile: LanguageProfile,
}

impl CatalogExtractor {
    pub fn new(profile: LanguageProfile, target: Option<&str>, negation: bool) -> Result<Self, PatternError> {
        let catalog = compile_catalog(&profile, target, negation)?;
        Ok(Self { catalog, profile })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn profile(&self) -> &LanguageProfile {
        &self.profile
    }

    pub fn records(&self, graph: &Graph) -> Vec<Result<RelationRecord, ProjectionError>> {
        let projector = Projector::new(&self.catalog, &self.profile);
        Matcher::new(graph)
            .find_catalog(&self.catalog)
            .iter()
            .map(|m| projector.project(graph, m))
            .collect()
    }
}

impl Extractor for CatalogExtractor {
    fn columns(&self) -> Vec<String> {
        RECORD_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn rows(&self, graph: &Graph) -> Vec<Result<Row, ProjectionError>> {
        self.records(graph)
            .into_iter()
            .map(|record| record.map(|r| r.to_row()))
            .collect()
    }
}

impl Extractor for SemgrexIndex {
    fn columns(&self) -> Vec<String> {
        SemgrexIndex::columns(self).to_vec()
    }

    fn rows(&self, graph: &Graph) -> Vec<Result<Row, ProjectionError>> {
        SemgrexIndex::rows(self, graph).into_iter().map(Ok).collect()
    }
}
