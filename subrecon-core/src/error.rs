//! Structured error types for subrecon.

use thiserror::Error;

/// Unified error type for all subrecon operations.
#[derive(Debug, Error)]
pub enum ReconError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed tree or alignment)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Rejected run configuration, detected before any column is analysed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal consistency check failed. Always fatal for the run.
    #[error("sanity check failed at column {column}: {detail}")]
    SanityCheck { column: usize, detail: String },

    /// Computation for a single column produced an unusable value.
    #[error("numerical failure at column {column}: {detail}")]
    Numerical { column: usize, detail: String },

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl ReconError {
    /// Whether this error must abort the whole run rather than a single column.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReconError::Numerical { .. })
    }
}

/// Convenience alias used throughout subrecon.
pub type Result<T> = std::result::Result<T, ReconError>;
