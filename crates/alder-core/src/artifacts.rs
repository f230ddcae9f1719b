//! Artifacts accumulated along a search path.
//!
//! Each child node starts from a clone of its parent's artifacts and fills in
//! the slot owned by the action that produced it.

use serde::{Deserialize, Serialize};

use crate::schema::SchemaSelection;

/// A literal from the question matched to stored database content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundedValue {
    /// Keyword as the oracle extracted it from the question.
    pub keyword: String,
    pub table: String,
    pub column: String,
    pub value: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_schema: Option<SchemaSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rephrased_question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounded_values: Vec<GroundedValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounded_functions: Vec<String>,
    /// Current SQL candidate (generation or revision output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    /// SQL carried by an END node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_sql_query: Option<String>,
    /// Execution agreement of `final_sql_query` with its sibling samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_score: Option<f64>,
}

impl Artifacts {
    /// The question the next prompt should work from.
    #[must_use]
    pub fn effective_question<'a>(&'a self, original: &'a str) -> &'a str {
        self.rephrased_question.as_deref().unwrap_or(original)
    }
}
