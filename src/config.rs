//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("delimiter must be a single ASCII character, got {0:?}")]
    Delimiter(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: PathBuf,
    /// Uncompressed output path; the final artifact is this path plus `.gz`
    pub output: PathBuf,
    #[serde(default = "PipelineConfig::default_id_col")]
    pub id_col: String,
    #[serde(default = "PipelineConfig::default_text_col")]
    pub text_col: String,
    #[serde(default = "PipelineConfig::default_batch_size")]
    pub batch_size: usize,
    /// Run the social-media cleanup on each text before parsing
    #[serde(default)]
    pub clean_text: bool,
    #[serde(default = "PipelineConfig::default_delimiter")]
    pub delimiter: char,
    /// Written in place of unpopulated fields
    #[serde(default)]
    pub absent_marker: String,
    /// Where to write `(id, conll_string)` rows for every parsed document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conll_output: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            id_col: Self::default_id_col(),
            text_col: Self::default_text_col(),
            batch_size: Self::default_batch_size(),
            clean_text: false,
            delimiter: Self::default_delimiter(),
            absent_marker: String::new(),
            conll_output: None,
        }
    }

    fn default_id_col() -> String {
        "id".to_string()
    }

    fn default_text_col() -> String {
        "text".to_string()
    }

    fn default_batch_size() -> usize {
        DEFAULT_BATCH_SIZE
    }

    fn default_delimiter() -> char {
        ','
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        self.delimiter_byte().map(|_| ())
    }

    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ConfigError::Delimiter(self.delimiter))
    }
}
