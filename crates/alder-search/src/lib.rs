//! # alder-search
//!
//! Monte Carlo tree search for text-to-SQL.
//!
//! A search walks stages (schema selection, rephrasing, value and function
//! grounding, SQL generation and revision) by asking an [`Oracle`] for
//! candidates, scores finished SQL by how consistently sibling samples agree
//! on their execution results, and persists every ROOT → END path for
//! external final selection.
//!
//! - [`action`]: legal actions per node and child construction
//! - [`node`]: arena-backed search tree
//! - [`reward`]: execution-consistency reward
//! - [`solver`]: select / expand / simulate / backpropagate
//! - [`runner`]: parallel batch execution with per-task failure isolation

pub mod action;
pub mod error;
pub mod node;
pub mod oracle;
pub mod parse;
pub mod reward;
pub mod runner;
pub mod solver;

pub use action::{Expansion, SearchContext, SearchSettings, create_children, legal_actions};
pub use error::{OracleError, SearchError};
pub use node::{NodeId, SampleGroup, SearchNode, SearchTree};
pub use oracle::{FnOracle, Oracle, PromptPayload};
pub use reward::RewardModel;
pub use runner::{BatchSummary, CONFIG_SNAPSHOT, SkippedTask, TaskRunner, TaskStatus, load_paths};
pub use solver::{MctsSolver, SolveOutcome, SolveReport};
