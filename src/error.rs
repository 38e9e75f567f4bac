// Error handling module
// Defines error types for configuration and sweep execution

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while configuring or running a rate sweep
#[derive(Error, Debug)]
pub enum SweepError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rate list entry could not be parsed
    #[error("Invalid request rate '{value}': {reason}")]
    InvalidRate { value: String, reason: String },

    /// Traffic split weights are malformed or inconsistent with the model list
    #[error("Invalid traffic split: {0}")]
    InvalidTrafficSplit(String),

    /// Filesystem error on a run artifact
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The benchmark client could not be started
    #[error("Failed to spawn benchmark client '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A run failed while the sweep was configured to abort on failure
    #[error("Run {sequence} at rate {rate} failed: {reason}")]
    RunFailed {
        sequence: usize,
        rate: String,
        reason: String,
    },
}

impl SweepError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SweepError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;
