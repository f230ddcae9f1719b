//! # alder-core
//!
//! Core types shared across all Alder crates:
//! - Task records (one natural-language question against one database)
//! - Database schema metadata (tables, columns, key relations)
//! - Search stages and action kinds, with the stage transition table
//! - Artifacts accumulated along a search path
//! - SQL execution results and their validity rule
//! - Node snapshots persisted as solver output
//! - Cross-cutting error types

pub mod artifacts;
pub mod enums;
pub mod errors;
pub mod execution;
pub mod schema;
pub mod snapshot;
pub mod task;

pub use artifacts::{Artifacts, GroundedValue};
pub use enums::{ActionKind, Stage};
pub use errors::CoreError;
pub use execution::{Cell, SqlExecutionResult, is_valid_result};
pub use schema::{ColumnInfo, ColumnRef, DatabaseSchema, SchemaSelection, TableSchema};
pub use snapshot::{NodeSnapshot, SearchPath, final_sql};
pub use task::Task;
