//! Execution and reward configuration.

use serde::{Deserialize, Serialize};

const fn default_execution_timeout_ms() -> u64 {
    30_000
}

const fn default_grace_period_ms() -> u64 {
    1_000
}

const fn default_cache_capacity() -> usize {
    16_384
}

const fn default_progress_interval_ops() -> i32 {
    1_000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RewardConfig {
    /// Wall-clock budget per query during search.
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,

    /// How long a timed-out caller waits for the worker to acknowledge the stop flag.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Entries kept by the execution memo table.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// `SQLite` VM instructions between stop-flag polls.
    #[serde(default = "default_progress_interval_ops")]
    pub progress_interval_ops: i32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            execution_timeout_ms: default_execution_timeout_ms(),
            grace_period_ms: default_grace_period_ms(),
            cache_capacity: default_cache_capacity(),
            progress_interval_ops: default_progress_interval_ops(),
        }
    }
}
