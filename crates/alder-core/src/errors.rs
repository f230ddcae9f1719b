//! Cross-cutting error types for Alder.
//!
//! Domain-specific errors (`DatabaseError`, `IndexError`, `SearchError`) live
//! in their respective crates. The binary converges them through `anyhow`.

use thiserror::Error;

/// Errors that can be raised by any Alder crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input data failed validation (missing fields, bad format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Reading or writing a file failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
