//! OpenAI-compatible chat-completions oracle.
//!
//! The search core is synchronous; requests are driven on the CLI's tokio
//! runtime through a [`Handle`], so callers must not be on a runtime worker
//! thread (use `spawn_blocking` or a plain thread).

use std::time::Duration;

use alder_config::OracleConfig;
use alder_core::ActionKind;
use alder_search::{Oracle, OracleError, PromptPayload};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

/// Exponential backoff between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Backoff is capped here; a server `Retry-After` is capped too.
    pub max_delay: Duration,
}

impl RetryPolicy {
    fn from_config(config: &OracleConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Delay after the `attempt`-th failure (1-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    n: usize,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

struct Failure {
    error: OracleError,
    retry_after: Option<Duration>,
}

impl From<OracleError> for Failure {
    fn from(error: OracleError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

pub struct HttpOracle {
    client: reqwest::Client,
    config: OracleConfig,
    retry: RetryPolicy,
    runtime: Handle,
}

impl HttpOracle {
    /// # Errors
    ///
    /// Returns [`OracleError::NotConfigured`] without a model and API key, and
    /// [`OracleError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &OracleConfig, runtime: Handle) -> Result<Self, OracleError> {
        if !config.is_configured() {
            return Err(OracleError::NotConfigured(
                "set oracle.model and ALDER_ORACLE__API_KEY".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            config: config.clone(),
            retry: RetryPolicy::from_config(config),
            runtime,
        })
    }

    async fn complete(
        &self,
        payload: &PromptPayload<'_>,
        n: usize,
    ) -> Result<Vec<String>, OracleError> {
        let user = serde_json::to_string(payload)
            .map_err(|e| OracleError::InvalidResponse(format!("payload encoding: {e}")))?;
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(instruction(payload.action).to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(user),
                },
            ],
            n,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut attempt = 1;
        loop {
            match self.send_once(&body).await {
                Ok(samples) => return Ok(samples),
                Err(failure) if failure.error.is_retryable() => {
                    if attempt >= self.retry.max_attempts {
                        return Err(OracleError::Exhausted {
                            attempts: attempt,
                            last: failure.error.to_string(),
                        });
                    }
                    let delay = failure
                        .retry_after
                        .map_or_else(|| self.retry.delay_for(attempt), |d| d.min(self.retry.max_delay));
                    tracing::warn!(
                        action = %payload.action,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %failure.error,
                        "oracle request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<Vec<String>, Failure> {
        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let resp = check_response(resp).await?;
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        Ok(extract_samples(parsed)?)
    }
}

impl Oracle for HttpOracle {
    fn request(&self, payload: &PromptPayload<'_>, n: usize) -> Result<Vec<String>, OracleError> {
        self.runtime.block_on(self.complete(payload, n))
    }
}

/// 429 carries `Retry-After` (seconds) when the server sends one; any other
/// non-success status becomes [`OracleError::Status`].
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, Failure> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let retry_after = (status == 429)
        .then(|| parse_retry_after(&resp))
        .flatten();
    Err(Failure {
        error: OracleError::Status {
            status,
            body: resp.text().await.unwrap_or_default(),
        },
        retry_after,
    })
}

fn parse_retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn extract_samples(response: ChatResponse) -> Result<Vec<String>, OracleError> {
    let samples: Vec<String> = response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .collect();
    if samples.is_empty() {
        return Err(OracleError::InvalidResponse(
            "response contained no message content".to_string(),
        ));
    }
    Ok(samples)
}

/// System instruction naming the reply format each action's parser expects.
const fn instruction(action: ActionKind) -> &'static str {
    match action {
        ActionKind::SchemaSelection => {
            "Select the tables and columns needed to answer the question. \
             Reply with a JSON object mapping each table name to a list of column names."
        }
        ActionKind::Rephrase => {
            "Rephrase the question so it is unambiguous against the schema and evidence. \
             Reply with JSON {\"rephrased_question\": \"...\"}."
        }
        ActionKind::ValueGrounding => {
            "List the literal values in the question that must match stored data. \
             Reply with a JSON array of strings."
        }
        ActionKind::FunctionGrounding => {
            "List the SQLite functions and operators the answer query will need. \
             Reply with a JSON array of strings."
        }
        ActionKind::SqlGeneration => {
            "Write one SQLite SELECT query that answers the question. \
             Reply with the query in a ```sql code block."
        }
        ActionKind::SqlRevision => {
            "The current SQL candidate and its execution feedback are attached. \
             Reply with a corrected SQLite SELECT query in a ```sql code block."
        }
        ActionKind::End => "",
    }
}
