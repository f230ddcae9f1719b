//! The oracle seam: the only way the search talks to a language model.
//!
//! The solver never formats prompts. It hands the oracle a structured
//! [`PromptPayload`] describing what the action needs and gets back raw
//! candidate strings, which the action catalog parses.

use alder_core::{ActionKind, Artifacts, DatabaseSchema};
use serde::Serialize;

use crate::error::OracleError;

/// Everything an action knows when it asks for candidates.
#[derive(Debug, Clone, Serialize)]
pub struct PromptPayload<'a> {
    pub action: ActionKind,
    /// Question as currently phrased on the path (rephrased if available).
    pub question: &'a str,
    pub original_question: &'a str,
    pub evidence: &'a str,
    /// Full schema, or the selected subset once schema selection has run.
    pub schema: DatabaseSchema,
    pub artifacts: &'a Artifacts,
    /// Outcome of executing the current SQL candidate, for revision prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_feedback: Option<String>,
}

/// Produces candidate strings for a prompt.
///
/// Calls are synchronous and may block for a long time; implementations
/// retry transient failures themselves. An `Err` fails the whole task.
pub trait Oracle: Send + Sync {
    /// Request up to `n` independent samples.
    ///
    /// # Errors
    ///
    /// Returns an [`OracleError`] when no samples could be obtained.
    fn request(&self, payload: &PromptPayload<'_>, n: usize) -> Result<Vec<String>, OracleError>;
}

/// Oracle backed by a closure; convenient for scripted runs and tests.
pub struct FnOracle<F>(pub F);

impl<F> Oracle for FnOracle<F>
where
    F: Fn(&PromptPayload<'_>, usize) -> Result<Vec<String>, OracleError> + Send + Sync,
{
    fn request(&self, payload: &PromptPayload<'_>, n: usize) -> Result<Vec<String>, OracleError> {
        (self.0)(payload, n)
    }
}

impl<O: Oracle + ?Sized> Oracle for std::sync::Arc<O> {
    fn request(&self, payload: &PromptPayload<'_>, n: usize) -> Result<Vec<String>, OracleError> {
        (**self).request(payload, n)
    }
}
