//! Error types for logfold.
//!
//! Configuration problems are fatal and surface before the scan loop starts.
//! Everything else is recoverable: transient I/O is logged and skipped for the
//! current scan, and append-retry exhaustion fails a single file without
//! touching the rest of the scan.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during consolidation.
#[derive(Error, Debug)]
pub enum FoldError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error for the state document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The consolidated file could not be appended to within the retry budget.
    #[error("append to {path} failed after {attempts} attempts: {source}")]
    AppendExhausted {
        /// Destination that rejected the write.
        path: PathBuf,
        /// Attempts made before giving up.
        attempts: u32,
        /// The last I/O error observed.
        #[source]
        source: std::io::Error,
    },
}

/// A specialized `Result` type for consolidation operations.
pub type Result<T> = std::result::Result<T, FoldError>;
