//! # alder-config
//!
//! Layered configuration loading for Alder using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`ALDER_*` prefix, `__` as separator)
//! 2. An explicit TOML file passed with `--config`
//! 3. Project-level `.alder/config.toml`
//! 4. User-level `~/.config/alder/config.toml`
//! 5. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `ALDER_SEARCH__MAX_DEPTH` -> `search.max_depth`,
//! `ALDER_ORACLE__API_KEY` -> `oracle.api_key`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use alder_config::AlderConfig;
//!
//! let config = AlderConfig::load_with_dotenv(None).expect("config");
//! println!("rollouts per task: {}", config.search.max_rollout_steps);
//! ```

mod error;
mod index;
mod oracle;
mod reward;
mod runner;
mod search;

pub use error::ConfigError;
pub use index::IndexConfig;
pub use oracle::OracleConfig;
pub use reward::RewardConfig;
pub use runner::RunnerConfig;
pub use search::SearchConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AlderConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub reward: RewardConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl AlderConfig {
    /// Load configuration from all sources and validate it.
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] on malformed sources and
    /// [`ConfigError::InvalidValue`] when validation fails.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(explicit).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load(explicit)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers.
    #[must_use]
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".alder/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("ALDER_").split("__"))
    }

    /// Reject values the search cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.max_rollout_steps == 0 {
            return Err(ConfigError::invalid(
                "search.max_rollout_steps",
                "must be at least 1",
            ));
        }
        if self.search.max_depth == 0 {
            return Err(ConfigError::invalid("search.max_depth", "must be at least 1"));
        }
        if !(self.search.exploration_constant.is_finite() && self.search.exploration_constant > 0.0)
        {
            return Err(ConfigError::invalid(
                "search.exploration_constant",
                "must be a positive finite number",
            ));
        }
        if self.oracle.sql_samples == 0 || self.oracle.preparatory_samples == 0 {
            return Err(ConfigError::invalid(
                "oracle.sql_samples",
                "sample counts must be at least 1",
            ));
        }
        if self.oracle.max_attempts == 0 {
            return Err(ConfigError::invalid("oracle.max_attempts", "must be at least 1"));
        }
        if self.reward.cache_capacity == 0 {
            return Err(ConfigError::invalid("reward.cache_capacity", "must be at least 1"));
        }
        if self.reward.progress_interval_ops <= 0 {
            return Err(ConfigError::invalid(
                "reward.progress_interval_ops",
                "must be positive",
            ));
        }
        if self.index.bands == 0 || self.index.num_perm % self.index.bands != 0 {
            return Err(ConfigError::invalid(
                "index.bands",
                format!(
                    "must be non-zero and divide index.num_perm ({})",
                    self.index.num_perm
                ),
            ));
        }
        if self.index.ngram == 0 {
            return Err(ConfigError::invalid("index.ngram", "must be at least 1"));
        }
        if self.runner.workers == 0 {
            return Err(ConfigError::invalid("runner.workers", "must be at least 1"));
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("alder").join("config.toml"))
    }
}
