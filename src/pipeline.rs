//! Batched streaming enrichment
//!
//! A run moves through three phases:
//!
//! 1. `counting-length`: count input rows for progress reporting
//! 2. `parsing-batches`: read rows in fixed-size batches, parse each batch,
//!    extract rows from every graph and append them to the output
//! 3. `finalizing`: close the writers and gzip the outputs in place
//!
//! Once the output is open, finalization runs exactly once, whether the
//! batch loop finished or was cancelled. Cancellation is only observed
//! between batches, so a cancelled run holds every row of the batches that
//! completed before it stopped.
//!
//! A record that fails to parse or project is logged with its row id and
//! skipped; a batch the parser rejects as a whole is logged and skipped.
//! Only I/O failures end a run early.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::Extractor;
use crate::normalize::normalize;
use crate::parser::{DependencyParser, Document, ParsedDocument, ParserError};
use crate::tabular::{RowReader, RowWriter, compress_outfile, count_rows};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Column holding the serialized parse in the CoNLL side output
pub const CONLL_COLUMN: &str = "conll_string";

/// Column holding the text sent to the parser in the CoNLL side output
pub const PARSED_TEXT_COLUMN: &str = "parsed_text";

/// Leading column of the main output when text cleanup is on
pub const CLEANED_TEXT_COLUMN: &str = "cleaned_text";

/// Shared flag asking a run to stop at the next batch boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CountingLength,
    ParsingBatches,
    Finalizing,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::CountingLength => "counting-length",
            Phase::ParsingBatches => "parsing-batches",
            Phase::Finalizing => "finalizing",
        }
    }
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Data rows counted before processing
    pub total_rows: u64,
    pub rows_read: u64,
    pub rows_written: u64,
    pub batches: usize,
    pub failed_batches: usize,
    /// Input rows and records dropped individually
    pub skipped_records: usize,
    /// Row ids of every failed document, batch or record, in input order
    pub failed_row_ids: Vec<String>,
    pub interrupted: bool,
    /// Compressed main output
    pub output: Option<PathBuf>,
    /// Compressed CoNLL side output
    pub conll_output: Option<PathBuf>,
}

/// Output writers owned by a run
struct Outputs {
    rows: RowWriter,
    /// Main rows start with the cleaned text
    cleaned: bool,
    conll: Option<RowWriter>,
}

pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn run(
        &self,
        parser: &mut dyn DependencyParser,
        extractor: &dyn Extractor,
    ) -> Result<RunSummary> {
        let config = &self.config;
        config.validate()?;
        let delimiter = config.delimiter_byte()?;
        let mut summary = RunSummary::default();

        info!(phase = Phase::CountingLength.name(), input = %config.input.display());
        summary.total_rows = count_rows(&config.input, delimiter)?;
        info!(rows = summary.total_rows, "counted input rows");

        let mut reader =
            RowReader::open(&config.input, delimiter, &config.id_col, &config.text_col)?;
        let mut columns = extractor.columns();
        if config.clean_text {
            columns.insert(0, CLEANED_TEXT_COLUMN.to_string());
        }
        let mut outputs = Outputs {
            rows: RowWriter::create(
                &config.output,
                delimiter,
                &config.id_col,
                &columns,
                &config.absent_marker,
            )?,
            cleaned: config.clean_text,
            conll: None,
        };
        if let Some(path) = &config.conll_output {
            outputs.conll = Some(RowWriter::create(
                path,
                delimiter,
                &config.id_col,
                &[PARSED_TEXT_COLUMN.to_string(), CONLL_COLUMN.to_string()],
                &config.absent_marker,
            )?);
        }

        info!(phase = Phase::ParsingBatches.name(), batch_size = config.batch_size);
        let processed = self.process(&mut reader, &mut outputs, parser, extractor, &mut summary);

        info!(phase = Phase::Finalizing.name(), interrupted = summary.interrupted);
        let finalized = finalize(outputs, &mut summary);

        processed?;
        finalized?;

        info!(
            rows_read = summary.rows_read,
            rows_written = summary.rows_written,
            batches = summary.batches,
            failed_batches = summary.failed_batches,
            skipped_records = summary.skipped_records,
            "run complete"
        );
        Ok(summary)
    }

    fn process(
        &self,
        reader: &mut RowReader,
        outputs: &mut Outputs,
        parser: &mut dyn DependencyParser,
        extractor: &dyn Extractor,
        summary: &mut RunSummary,
    ) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                warn!(batches = summary.batches, "cancelled, stopping before next batch");
                summary.interrupted = true;
                return Ok(());
            }

            let (docs, exhausted) = self.read_batch(reader, summary)?;
            if !docs.is_empty() {
                self.process_batch(&docs, outputs, parser, extractor, summary)?;
                outputs.rows.flush()?;
                if let Some(conll) = outputs.conll.as_mut() {
                    conll.flush()?;
                }
                summary.batches += 1;
                info!(
                    batch = summary.batches,
                    done = summary.rows_read,
                    total = summary.total_rows,
                    "batch complete"
                );
            }

            if exhausted {
                return Ok(());
            }
        }
    }

    /// Read up to `batch_size` documents; the flag is set at end of input
    fn read_batch(
        &self,
        reader: &mut RowReader,
        summary: &mut RunSummary,
    ) -> Result<(Vec<Document>, bool)> {
        let mut docs = Vec::with_capacity(self.config.batch_size.min(1024));

        while docs.len() < self.config.batch_size {
            let Some(next) = reader.next_row() else {
                return Ok((docs, true));
            };
            summary.rows_read += 1;
            match next? {
                Ok(row) => {
                    let text = if self.config.clean_text {
                        normalize(&row.text)
                    } else {
                        row.text
                    };
                    docs.push(Document::new(row.id, text));
                }
                Err(line) => {
                    warn!(line, "skipping undecodable input row");
                    summary.skipped_records += 1;
                }
            }
        }

        Ok((docs, false))
    }

    fn process_batch(
        &self,
        docs: &[Document],
        outputs: &mut Outputs,
        parser: &mut dyn DependencyParser,
        extractor: &dyn Extractor,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let results = match parser.parse_batch(docs) {
            Ok(results) => results,
            Err(e) => {
                let first = docs.first().map_or("", |d| d.row_id.as_str());
                warn!(row_id = first, size = docs.len(), error = %e, "parser failed on batch, skipping it");
                summary.failed_batches += 1;
                summary
                    .failed_row_ids
                    .extend(docs.iter().map(|d| d.row_id.clone()));
                return Ok(());
            }
        };

        if results.len() != docs.len() {
            warn!(
                expected = docs.len(),
                got = results.len(),
                "parser returned a different number of documents"
            );
        }

        // Documents past the end of a short result list count as failed items
        let mut results = results.into_iter();
        for doc in docs {
            let result = results.next().unwrap_or_else(|| {
                Err(ParserError::Missing {
                    row_id: doc.row_id.clone(),
                })
            });
            match result {
                Ok(parsed) => self.write_document(doc, &parsed, outputs, extractor, summary)?,
                Err(e) => {
                    warn!(row_id = %doc.row_id, error = %e, "failed to parse document, skipping it");
                    summary.skipped_records += 1;
                    summary.failed_row_ids.push(doc.row_id.clone());
                }
            }
        }

        Ok(())
    }

    fn write_document(
        &self,
        doc: &Document,
        parsed: &ParsedDocument,
        outputs: &mut Outputs,
        extractor: &dyn Extractor,
        summary: &mut RunSummary,
    ) -> Result<()> {
        if let (Some(writer), Some(conll)) = (outputs.conll.as_mut(), &parsed.conll) {
            writer.write_row(
                &parsed.row_id,
                &[Some(doc.text.clone()), Some(conll.clone())],
            )?;
        }

        let mut failed = false;
        for row in extractor.rows(&parsed.graph) {
            match row {
                Ok(mut cells) => {
                    if outputs.cleaned {
                        cells.insert(0, Some(doc.text.clone()));
                    }
                    outputs.rows.write_row(&parsed.row_id, &cells)?;
                    summary.rows_written += 1;
                }
                Err(e) => {
                    warn!(row_id = %parsed.row_id, error = %e, "skipping malformed record");
                    summary.skipped_records += 1;
                    failed = true;
                }
            }
        }
        if failed {
            summary.failed_row_ids.push(parsed.row_id.clone());
        }

        debug!(row_id = %parsed.row_id, tokens = parsed.graph.len(), "document done");
        Ok(())
    }
}

/// Close every writer and compress what was written
fn finalize(outputs: Outputs, summary: &mut RunSummary) -> Result<()> {
    let path = outputs.rows.close()?;
    summary.output = Some(compress_outfile(&path)?);
    info!(output = %path.display(), "compressed output");

    if let Some(conll) = outputs.conll {
        let path = conll.close()?;
        summary.conll_output = Some(compress_outfile(&path)?);
        info!(output = %path.display(), "compressed CoNLL output");
    }

    Ok(())
}
