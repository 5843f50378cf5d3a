use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = ExperimentError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Template, override or tool configuration could not be read or is malformed.
    #[error("config error in {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// The solver could not be spawned, exited unsuccessfully or wrote garbage to stdout.
    #[error("solver invocation on {graph:?} failed: {reason}")]
    SolverInvocation { graph: PathBuf, reason: String },

    /// A log line or table does not have the expected shape.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A field cannot be represented in the tabular format.
    #[error("cannot encode field {field:?}: {reason}")]
    Encoding { field: String, reason: String },

    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    #[error("worker slot {slot} panicked while executing a work item")]
    WorkerPanicked { slot: usize },

    /// A slot thread died, leaving items that were never executed.
    #[error("worker slot {slot} stopped with {remaining} items unfinished")]
    SlotStopped { slot: usize, remaining: usize },

    #[error("aggregation failed: {0}")]
    Aggregation(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExperimentError {
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    /// Lookup failures are reported separately from run failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
