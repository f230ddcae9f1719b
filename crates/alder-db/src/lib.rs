//! # alder-db
//!
//! Read-only `SQLite` access for Alder.
//!
//! - [`SchemaCache`]: per-database schema metadata, loaded once and shared
//! - [`ExecutionEngine`]: timeout-bounded execution behind a bounded LRU memo
//! - [`execute_no_timeout`]: uncancellable execution for offline index builds
//!
//! Uses `rusqlite` with the bundled `SQLite` and its progress-handler hook,
//! which is what makes cooperative query cancellation possible.

pub mod cache;
pub mod engine;
pub mod error;
pub mod schema_cache;

pub use engine::{
    CacheStats, ExecutionEngine, ExecutionOptions, execute_no_timeout, execute_with_timeout,
    open_read_only,
};
pub use error::DatabaseError;
pub use schema_cache::{SchemaCache, db_path, load_schema};
