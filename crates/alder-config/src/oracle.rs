//! Oracle (completion endpoint) configuration.

use serde::{Deserialize, Serialize};

const fn default_temperature() -> f64 {
    0.8
}

const fn default_preparatory_samples() -> u32 {
    1
}

const fn default_sql_samples() -> u32 {
    5
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_max_attempts() -> u32 {
    4
}

const fn default_request_timeout_secs() -> u64 {
    120
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OracleConfig {
    /// OpenAI-compatible chat completions URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub model: String,

    /// Bearer token. Usually supplied through `ALDER_ORACLE__API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Samples requested per schema/rephrase/grounding action.
    #[serde(default = "default_preparatory_samples")]
    pub preparatory_samples: u32,

    /// Samples requested per SQL generation/revision action.
    #[serde(default = "default_sql_samples")]
    pub sql_samples: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl OracleConfig {
    /// Whether enough is set to call a remote endpoint.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.model.is_empty() && !self.api_key.is_empty()
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: String::new(),
            api_key: String::new(),
            temperature: default_temperature(),
            preparatory_samples: default_preparatory_samples(),
            sql_samples: default_sql_samples(),
            max_tokens: default_max_tokens(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
