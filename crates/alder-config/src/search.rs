//! Tree search configuration.

use serde::{Deserialize, Serialize};

const fn default_max_rollout_steps() -> u32 {
    24
}

const fn default_max_depth() -> usize {
    6
}

const fn default_exploration_constant() -> f64 {
    std::f64::consts::SQRT_2
}

const fn default_random_seed() -> u64 {
    42
}

fn default_db_root_dir() -> String {
    "data/databases".to_string()
}

fn default_save_root_dir() -> String {
    "results".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Directory holding `<db_id>/<db_id>.sqlite` files.
    #[serde(default = "default_db_root_dir")]
    pub db_root_dir: String,

    /// Rollout budget per task.
    #[serde(default = "default_max_rollout_steps")]
    pub max_rollout_steps: u32,

    /// Depth after which only SQL-producing actions stay legal.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// UCT exploration constant `c`.
    #[serde(default = "default_exploration_constant")]
    pub exploration_constant: f64,

    /// Output directory for per-task path files.
    #[serde(default = "default_save_root_dir")]
    pub save_root_dir: String,

    /// Base seed; each task derives its own seed from it.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            db_root_dir: default_db_root_dir(),
            max_rollout_steps: default_max_rollout_steps(),
            max_depth: default_max_depth(),
            exploration_constant: default_exploration_constant(),
            save_root_dir: default_save_root_dir(),
            random_seed: default_random_seed(),
        }
    }
}
