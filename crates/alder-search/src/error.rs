//! Search error types for alder-search.

/// Failures reported by an [`Oracle`](crate::Oracle).
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// No endpoint, model, or credentials were configured.
    #[error("oracle not configured: {0}")]
    NotConfigured(String),

    /// The request never produced a response.
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("oracle returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered, but not in the expected shape.
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),

    /// Every retry attempt failed.
    #[error("oracle failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl OracleError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotConfigured(_) | Self::InvalidResponse(_) | Self::Exhausted { .. } => false,
        }
    }
}

/// Errors that abort solving one task.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("database error: {0}")]
    Database(#[from] alder_db::DatabaseError),

    #[error("value index error: {0}")]
    Index(#[from] alder_index::IndexError),

    /// A node's children may be populated only once.
    #[error("node {0} is already expanded")]
    AlreadyExpanded(usize),

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker pool could not be started.
    #[error("runner error: {0}")]
    Runner(String),
}
