//! Search stages and action kinds.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! The stage machine is encoded as a static table: [`Stage::legal_actions`]
//! lists the actions that may fire from a stage, and [`ActionKind::target_stage`]
//! names the stage each action produces.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Stage of a search node.
///
/// ```text
/// root ─┬→ rephrase ─┐
///       ├→ schema_selection ─┐
///       ├→ value_grounding ──┼→ (any remaining preparatory stage) → sql_generation
///       ├→ function_grounding┘                                      │
///       └→ sql_generation ──────────────────────────────────────────┤
///                                   sql_generation → sql_revision → end
///                                   sql_generation → end
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Root,
    SchemaSelection,
    Rephrase,
    ValueGrounding,
    FunctionGrounding,
    SqlGeneration,
    SqlRevision,
    End,
}

impl Stage {
    /// Actions that may fire from this stage, in catalog order.
    #[must_use]
    pub const fn legal_actions(self) -> &'static [ActionKind] {
        use ActionKind as A;
        match self {
            Self::Root => &[
                A::Rephrase,
                A::SchemaSelection,
                A::ValueGrounding,
                A::FunctionGrounding,
                A::SqlGeneration,
            ],
            Self::Rephrase => &[
                A::SchemaSelection,
                A::ValueGrounding,
                A::FunctionGrounding,
                A::SqlGeneration,
            ],
            Self::SchemaSelection => &[A::ValueGrounding, A::FunctionGrounding, A::SqlGeneration],
            Self::ValueGrounding => &[A::SchemaSelection, A::FunctionGrounding, A::SqlGeneration],
            Self::FunctionGrounding => &[A::SchemaSelection, A::ValueGrounding, A::SqlGeneration],
            Self::SqlGeneration => &[A::SqlRevision, A::End],
            Self::SqlRevision => &[A::End],
            Self::End => &[],
        }
    }

    /// Whether this is the terminal stage.
    #[must_use]
    pub const fn is_end(self) -> bool {
        matches!(self, Self::End)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::SchemaSelection => "schema_selection",
            Self::Rephrase => "rephrase",
            Self::ValueGrounding => "value_grounding",
            Self::FunctionGrounding => "function_grounding",
            Self::SqlGeneration => "sql_generation",
            Self::SqlRevision => "sql_revision",
            Self::End => "end",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// Transition type between two stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SchemaSelection,
    Rephrase,
    ValueGrounding,
    FunctionGrounding,
    SqlGeneration,
    SqlRevision,
    End,
}

impl ActionKind {
    /// Stage of the child nodes this action creates.
    #[must_use]
    pub const fn target_stage(self) -> Stage {
        match self {
            Self::SchemaSelection => Stage::SchemaSelection,
            Self::Rephrase => Stage::Rephrase,
            Self::ValueGrounding => Stage::ValueGrounding,
            Self::FunctionGrounding => Stage::FunctionGrounding,
            Self::SqlGeneration => Stage::SqlGeneration,
            Self::SqlRevision => Stage::SqlRevision,
            Self::End => Stage::End,
        }
    }

    /// Actions that only enrich context and never produce SQL.
    ///
    /// These are dropped from the legal set once a path reaches the depth limit.
    #[must_use]
    pub const fn is_preparatory(self) -> bool {
        matches!(
            self,
            Self::SchemaSelection | Self::Rephrase | Self::ValueGrounding | Self::FunctionGrounding
        )
    }

    /// Actions whose children carry a SQL candidate.
    #[must_use]
    pub const fn produces_sql(self) -> bool {
        matches!(self, Self::SqlGeneration | Self::SqlRevision)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchemaSelection => "schema_selection",
            Self::Rephrase => "rephrase",
            Self::ValueGrounding => "value_grounding",
            Self::FunctionGrounding => "function_grounding",
            Self::SqlGeneration => "sql_generation",
            Self::SqlRevision => "sql_revision",
            Self::End => "end",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STAGES: [Stage; 8] = [
        Stage::Root,
        Stage::SchemaSelection,
        Stage::Rephrase,
        Stage::ValueGrounding,
        Stage::FunctionGrounding,
        Stage::SqlGeneration,
        Stage::SqlRevision,
        Stage::End,
    ];

    #[test]
    fn end_is_the_only_stage_without_actions() {
        for stage in ALL_STAGES {
            assert_eq!(stage.legal_actions().is_empty(), stage.is_end(), "{stage}");
        }
    }

    #[test]
    fn no_stage_offers_its_own_action() {
        for stage in ALL_STAGES {
            for action in stage.legal_actions() {
                assert_ne!(action.target_stage(), stage, "{stage} loops via {action}");
            }
        }
    }

    #[test]
    fn every_non_sql_stage_can_reach_sql_generation() {
        for stage in ALL_STAGES {
            if matches!(stage, Stage::SqlGeneration | Stage::SqlRevision | Stage::End) {
                continue;
            }
            assert!(
                stage.legal_actions().contains(&ActionKind::SqlGeneration),
                "{stage} has no path to sql"
            );
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Stage::SqlRevision).unwrap();
        assert_eq!(json, "\"sql_revision\"");
        let back: ActionKind = serde_json::from_str("\"function_grounding\"").unwrap();
        assert_eq!(back, ActionKind::FunctionGrounding);
    }
}
