//! Dependency parser collaborators
//!
//! The pipeline hands batches of `(row id, text)` documents to a
//! [`DependencyParser`] and gets back one graph per document, plus the
//! CoNLL-U serialization of that graph for the side output.
//!
//! Two implementations are provided: [`ConlluParser`] for input that is
//! already CoNLL-U, and [`CommandParser`], which pipes each text through an
//! external program that prints CoNLL-U.

use crate::conllu::{ParseError, parse_graph, write_graph};
use crate::graph::{Graph, Vocab};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("row {row_id}: {source}")]
    Conllu {
        row_id: String,
        #[source]
        source: ParseError,
    },

    #[error("row {row_id}: failed to run {program}: {source}")]
    Spawn {
        row_id: String,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("row {row_id}: {program} exited with {status}: {stderr}")]
    Exit {
        row_id: String,
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("row {row_id}: parser output is not valid UTF-8")]
    Utf8 { row_id: String },

    #[error("row {row_id}: parser returned no result")]
    Missing { row_id: String },

    #[error("batch failed: {0}")]
    Batch(String),
}

/// A text to parse, tagged with its source row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub row_id: String,
    pub text: String,
}

impl Document {
    pub fn new(row_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            row_id: row_id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub row_id: String,
    pub graph: Graph,
    /// CoNLL-U serialization of `graph`
    pub conll: Option<String>,
}

pub trait DependencyParser {
    fn parse(&mut self, doc: &Document) -> Result<ParsedDocument, ParserError>;

    /// Parse a batch, one result per document in input order
    ///
    /// An outer `Err` means the whole batch failed and none of its
    /// documents were parsed.
    fn parse_batch(
        &mut self,
        docs: &[Document],
    ) -> Result<Vec<Result<ParsedDocument, ParserError>>, ParserError> {
        Ok(docs.iter().map(|doc| self.parse(doc)).collect())
    }
}

/// Reads documents whose text already is CoNLL-U
#[derive(Debug, Clone, Default)]
pub struct ConlluParser {
    vocab: Vocab,
}

impl ConlluParser {
    pub fn new(vocab: Vocab) -> Self {
        Self { vocab }
    }
}

impl DependencyParser for ConlluParser {
    fn parse(&mut self, doc: &Document) -> Result<ParsedDocument, ParserError> {
        let graph = parse_graph(&doc.text, &self.vocab).map_err(|source| ParserError::Conllu {
            row_id: doc.row_id.clone(),
            source,
        })?;
        Ok(ParsedDocument {
            row_id: doc.row_id.clone(),
            conll: Some(doc.text.clone()),
            graph,
        })
    }
}

/// Runs an external program once per document: text on stdin, CoNLL-U on
/// stdout
#[derive(Debug, Clone)]
pub struct CommandParser {
    program: String,
    args: Vec<String>,
    vocab: Vocab,
}

impl CommandParser {
    pub fn new(program: impl Into<String>, args: Vec<String>, vocab: Vocab) -> Self {
        Self {
            program: program.into(),
            args,
            vocab,
        }
    }

    /// Split a shell-like command line on whitespace
    pub fn from_command_line(command: &str, vocab: Vocab) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), vocab))
    }

    fn run(&self, doc: &Document) -> Result<String, ParserError> {
        let spawn_error = |source| ParserError::Spawn {
            row_id: doc.row_id.clone(),
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Feed stdin from another thread so a chatty child cannot block us
        let writer = child.stdin.take().map(|mut stdin| {
            let text = doc.text.clone();
            thread::spawn(move || stdin.write_all(text.as_bytes()))
        });

        let output = child.wait_with_output().map_err(spawn_error)?;
        let written = match writer.map(thread::JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(io::Error::other("stdin writer panicked")),
            None => Ok(()),
        };

        if !output.status.success() {
            return Err(ParserError::Exit {
                row_id: doc.row_id.clone(),
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        // A child that exits successfully without reading all of stdin is fine
        match written {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(spawn_error(e)),
            _ => {}
        }

        String::from_utf8(output.stdout).map_err(|_| ParserError::Utf8 {
            row_id: doc.row_id.clone(),
        })
    }
}

impl DependencyParser for CommandParser {
    fn parse(&mut self, doc: &Document) -> Result<ParsedDocument, ParserError> {
        let conll = self.run(doc)?;
        let graph = parse_graph(&conll, &self.vocab).map_err(|source| ParserError::Conllu {
            row_id: doc.row_id.clone(),
            source,
        })?;
        debug!(row_id = %doc.row_id, tokens = graph.len(), "parsed document");
        Ok(ParsedDocument {
            row_id: doc.row_id.clone(),
            conll: Some(write_graph(&graph)),
            graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAT_MOUSE: &str = "# text = The cat eats the mouse
1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_
2\tcat\tcat\tNOUN\tNN\t_\t3\tnsubj\t_\t_
3\teats\teat\tVERB\tVBZ\t_\t0\troot\t_\t_
4\tthe\tthe\tDET\tDT\t_\t5\tdet\t_\t_
5\tmouse\tmouse\tNOUN\tNN\t_\t3\tobj\t_\t_
";

    #[test]
    fn test_conllu_parser_batch_keeps_item_failures_local() {
        let mut parser = ConlluParser::default();
        let docs = vec![
            Document::new("1", CAT_MOUSE),
            Document::new("2", "1\tbroken\n"),
            Document::new("3", CAT_MOUSE),
        ];
        let results = parser.parse_batch(&docs).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().graph.len(), 5);
        assert!(matches!(
            &results[1],
            Err(ParserError::Conllu { row_id, .. }) if row_id == "2"
        ));
        assert_eq!(results[2].as_ref().unwrap().row_id, "3");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_parser_reads_stdout() {
        let mut parser = CommandParser::from_command_line("cat", Vocab::new()).unwrap();
        let parsed = parser.parse(&Document::new("7", CAT_MOUSE)).unwrap();

        assert_eq!(parsed.row_id, "7");
        assert_eq!(parsed.graph.lemma(2), Some("eat"));
        assert_eq!(parsed.graph.text.as_deref(), Some("The cat eats the mouse"));
        assert!(parsed.conll.unwrap().contains("\teats\teat\tVERB\t"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_parser_failures() {
        let mut parser = CommandParser::from_command_line("false", Vocab::new()).unwrap();
        let err = parser.parse(&Document::new("8", "text")).unwrap_err();
        assert!(matches!(err, ParserError::Exit { ref row_id, .. } if row_id == "8"));

        let mut parser = CommandParser::new("/nonexistent/parser", vec![], Vocab::new());
        let err = parser.parse(&Document::new("9", "text")).unwrap_err();
        assert!(matches!(err, ParserError::Spawn { .. }));

        assert!(CommandParser::from_command_line("   ", Vocab::new()).is_none());
    }
}
