//! Run-level errors
//!
//! Only failures that end a run surface here. Record and batch failures are
//! logged and counted in the run summary instead.

use crate::config::ConfigError;
use crate::pattern::PatternError;
use crate::profile::ProfileError;
use crate::semgrex::SemgrexError;
use crate::tabular::TabularError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Tabular(#[from] TabularError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Semgrex(#[from] SemgrexError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
