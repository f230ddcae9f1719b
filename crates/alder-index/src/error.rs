//! Value index error types.

/// Errors from building, persisting, or loading a value index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Index parameters that cannot produce a usable LSH layout.
    #[error("invalid index parameters: {0}")]
    InvalidParams(String),

    /// Database access failed while building.
    #[error("database error: {0}")]
    Database(#[from] alder_db::DatabaseError),

    /// Reading or writing the index file failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The index file is not valid JSON for this format.
    #[error("index format error: {0}")]
    Format(#[from] serde_json::Error),
}
