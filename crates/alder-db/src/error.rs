//! Database error types for alder-db.

use thiserror::Error;

/// Errors from schema loading and database access.
///
/// Query execution itself never returns these: failures during a query are
/// reported as [`alder_core::SqlExecutionResult::Error`].
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database file for a db id does not exist.
    #[error("Database not found: {db_id} (expected at {path})")]
    NotFound { db_id: String, path: String },

    /// A db id that would escape the database root.
    #[error("Invalid database id: {0:?}")]
    InvalidDbId(String),

    /// A metadata query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Underlying `SQLite` error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
