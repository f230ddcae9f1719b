//! Batch runner configuration.

use serde::{Deserialize, Serialize};

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Tasks solved concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Re-solve tasks whose output file already exists.
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            overwrite: false,
        }
    }
}
