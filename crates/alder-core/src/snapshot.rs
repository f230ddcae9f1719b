//! Node snapshots: the persisted form of a search path.

use serde::{Deserialize, Serialize};

use crate::artifacts::Artifacts;
use crate::enums::{ActionKind, Stage};

/// Immutable copy of one search node taken at result extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub depth: usize,
    pub stage: Stage,
    pub parent_action: Option<ActionKind>,
    pub artifacts: Artifacts,
    /// Cumulative reward.
    pub q: f64,
    /// Visit count.
    pub n: u64,
}

/// Ordered snapshots from ROOT to an END node.
pub type SearchPath = Vec<NodeSnapshot>;

/// Final SQL of a path, if it ends in an END node that carries one.
#[must_use]
pub fn final_sql(path: &[NodeSnapshot]) -> Option<&str> {
    path.last()
        .filter(|node| node.stage == Stage::End)
        .and_then(|node| node.artifacts.final_sql_query.as_deref())
}
