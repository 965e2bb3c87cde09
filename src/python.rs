//! Python bindings for depmatch
//!
//! This module provides PyO3-based Python bindings for the Rust core.

use pyo3::exceptions::{PyIndexError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::sync::Arc;

use crate::conllu::{ParseError, parse_graph, write_graph};
use crate::extract::{CatalogExtractor, Extractor, Row};
use crate::graph::{Graph as RustGraph, NodeId, Vocab};
use crate::normalize::normalize;
use crate::pattern::PatternError;
use crate::profile::{LanguageProfile, ProfileError};
use crate::semgrex::{SemgrexError, SemgrexIndex};

impl From<ParseError> for PyErr {
    fn from(err: ParseError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<ProfileError> for PyErr {
    fn from(err: ProfileError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<PatternError> for PyErr {
    fn from(err: PatternError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<SemgrexError> for PyErr {
    fn from(err: SemgrexError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// A parsed document
#[pyclass(name = "Graph")]
#[derive(Clone)]
pub struct PyGraph {
    inner: Arc<RustGraph>,
}

impl PyGraph {
    fn check(&self, id: NodeId) -> PyResult<()> {
        if id < self.inner.len() {
            Ok(())
        } else {
            Err(PyIndexError::new_err(format!("node index out of range: {}", id)))
        }
    }
}

#[pymethods]
impl PyGraph {
    #[staticmethod]
    fn from_conll(text: &str) -> PyResult<Self> {
        Ok(Self {
            inner: Arc::new(parse_graph(text, &Vocab::new())?),
        })
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    #[getter]
    fn text(&self) -> Option<String> {
        self.inner.text.clone()
    }

    #[getter]
    fn sentence_count(&self) -> usize {
        self.inner.sentence_count()
    }

    fn form(&self, id: NodeId) -> PyResult<String> {
        self.check(id)?;
        Ok(self.inner.form(id).unwrap_or_default().to_string())
    }

    fn lemma(&self, id: NodeId) -> PyResult<String> {
        self.check(id)?;
        Ok(self.inner.lemma(id).unwrap_or_default().to_string())
    }

    fn upos(&self, id: NodeId) -> PyResult<String> {
        self.check(id)?;
        Ok(self.inner.upos(id).unwrap_or_default().to_string())
    }

    fn deprel(&self, id: NodeId) -> PyResult<String> {
        self.check(id)?;
        Ok(self.inner.deprel(id).unwrap_or_default().to_string())
    }

    fn head(&self, id: NodeId) -> PyResult<Option<NodeId>> {
        self.check(id)?;
        Ok(self.inner.head(id))
    }

    fn children(&self, id: NodeId) -> PyResult<Vec<NodeId>> {
        self.check(id)?;
        Ok(self.inner.children(id).to_vec())
    }

    fn to_conll(&self) -> String {
        write_graph(&self.inner)
    }

    fn __repr__(&self) -> String {
        format!(
            "Graph(tokens={}, sentences={})",
            self.inner.len(),
            self.inner.sentence_count()
        )
    }
}

fn rows_to_dicts<'py>(
    py: Python<'py>,
    columns: &[String],
    rows: impl IntoIterator<Item = Row>,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    rows.into_iter()
        .map(|row| {
            let dict = PyDict::new(py);
            for (column, cell) in columns.iter().zip(row) {
                dict.set_item(column, cell)?;
            }
            Ok(dict)
        })
        .collect()
}

/// Extract relation records from a CoNLL-U document
#[pyfunction]
#[pyo3(signature = (conll, target=None, negation=false, lang="en"))]
fn extract<'py>(
    py: Python<'py>,
    conll: &str,
    target: Option<&str>,
    negation: bool,
    lang: &str,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let graph = parse_graph(conll, &Vocab::new())?;
    let extractor = CatalogExtractor::new(LanguageProfile::builtin(lang)?, target, negation)?;
    let rows = extractor.valid_rows(&graph);
    rows_to_dicts(py, &extractor.columns(), rows)
}

/// Match a JSON semgrex catalog against a CoNLL-U document
#[pyfunction]
fn match_patterns<'py>(
    py: Python<'py>,
    conll: &str,
    patterns: &str,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let graph = parse_graph(conll, &Vocab::new())?;
    let index = SemgrexIndex::from_json(patterns)?;
    rows_to_dicts(py, index.columns(), index.rows(&graph))
}

#[pyfunction]
#[pyo3(name = "normalize")]
fn py_normalize(text: &str) -> String {
    normalize(text)
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn depmatch(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGraph>()?;

    m.add_function(wrap_pyfunction!(extract, m)?)?;
    m.add_function(wrap_pyfunction!(match_patterns, m)?)?;
    m.add_function(wrap_pyfunction!(py_normalize, m)?)?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;

    Ok(())
}
