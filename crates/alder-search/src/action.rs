//! Action catalog: which actions are legal at a node, and how each one turns
//! oracle samples into child nodes.

use std::path::PathBuf;
use std::sync::Arc;

use alder_config::AlderConfig;
use alder_core::{ActionKind, Artifacts, DatabaseSchema, GroundedValue, Task};
use alder_db::ExecutionEngine;
use alder_index::ValueIndex;

use crate::error::SearchError;
use crate::node::{NodeId, SampleGroup, SearchTree};
use crate::oracle::{Oracle, PromptPayload};
use crate::parse;
use crate::reward::RewardModel;

/// Tunables the catalog and solver read on every expansion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    pub max_depth: usize,
    pub exploration_constant: f64,
    pub preparatory_samples: usize,
    pub sql_samples: usize,
    pub top_k: usize,
    pub min_similarity: f64,
}

impl From<&AlderConfig> for SearchSettings {
    fn from(config: &AlderConfig) -> Self {
        Self {
            max_depth: config.search.max_depth,
            exploration_constant: config.search.exploration_constant,
            preparatory_samples: config.oracle.preparatory_samples as usize,
            sql_samples: config.oracle.sql_samples as usize,
            top_k: config.index.top_k,
            min_similarity: config.index.min_similarity,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from(&AlderConfig::default())
    }
}

/// Read-only collaborators for one task's search.
pub struct SearchContext<'a> {
    pub task: &'a Task,
    pub schema: Arc<DatabaseSchema>,
    pub db_path: PathBuf,
    pub engine: &'a ExecutionEngine,
    pub oracle: &'a dyn Oracle,
    /// `None` when no value index was built for the database.
    pub values: Option<Arc<ValueIndex>>,
    pub settings: SearchSettings,
}

impl SearchContext<'_> {
    #[must_use]
    pub const fn reward(&self) -> RewardModel<'_> {
        RewardModel::new(self.engine)
    }

    fn payload<'p>(
        &'p self,
        action: ActionKind,
        artifacts: &'p Artifacts,
        execution_feedback: Option<String>,
    ) -> PromptPayload<'p> {
        let schema = artifacts
            .selected_schema
            .as_ref()
            .map_or_else(|| (*self.schema).clone(), |s| self.schema.subset(s));
        PromptPayload {
            action,
            question: artifacts.effective_question(&self.task.question),
            original_question: &self.task.question,
            evidence: &self.task.evidence,
            schema,
            artifacts,
            execution_feedback,
        }
    }

    const fn samples_for(&self, action: ActionKind) -> usize {
        if action.produces_sql() {
            self.settings.sql_samples
        } else {
            self.settings.preparatory_samples
        }
    }
}

/// Children built by one action invocation.
#[derive(Debug, Default)]
pub struct Expansion {
    pub children: Vec<NodeId>,
    /// Samples that could not be parsed.
    pub dropped: usize,
}

/// Actions that may fire from `node`, in catalog order.
///
/// Each action kind is used at most once per path, and preparatory actions
/// stop once the node sits at `max_depth` or deeper.
#[must_use]
pub fn legal_actions(tree: &SearchTree, node: NodeId, max_depth: usize) -> Vec<ActionKind> {
    let current = tree.node(node);
    let used = tree.used_actions(node);
    current
        .stage
        .legal_actions()
        .iter()
        .copied()
        .filter(|action| !used.contains(action))
        .filter(|action| !(action.is_preparatory() && current.depth >= max_depth))
        .collect()
}

/// Invoke `action` from `parent` and allocate one child per usable sample.
///
/// SQL children may get a forced END child attached here: every revision
/// does, and a generation does when its draft executes to a valid result.
///
/// # Errors
///
/// Propagates oracle failures and value-index load errors.
pub fn create_children(
    action: ActionKind,
    tree: &mut SearchTree,
    parent: NodeId,
    ctx: &SearchContext<'_>,
) -> Result<Expansion, SearchError> {
    match action {
        ActionKind::End => Ok(end_from_open_draft(tree, parent, ctx)),
        ActionKind::SqlGeneration | ActionKind::SqlRevision => sql_children(action, tree, parent, ctx),
        ActionKind::SchemaSelection
        | ActionKind::Rephrase
        | ActionKind::ValueGrounding
        | ActionKind::FunctionGrounding => preparatory_children(action, tree, parent, ctx),
    }
}

fn preparatory_children(
    action: ActionKind,
    tree: &mut SearchTree,
    parent: NodeId,
    ctx: &SearchContext<'_>,
) -> Result<Expansion, SearchError> {
    let base = tree.node(parent).artifacts.clone();
    let samples = ctx
        .oracle
        .request(&ctx.payload(action, &base, None), ctx.samples_for(action))?;

    let mut expansion = Expansion::default();
    for sample in &samples {
        let mut artifacts = base.clone();
        let parsed = match action {
            ActionKind::SchemaSelection => parse::parse_schema_selection(sample, &ctx.schema)
                .map(|selection| artifacts.selected_schema = Some(selection)),
            ActionKind::Rephrase => parse::parse_rephrase(sample)
                .map(|question| artifacts.rephrased_question = Some(question)),
            ActionKind::ValueGrounding => parse::parse_string_list(sample)
                .map(|keywords| artifacts.grounded_values = ground_values(&keywords, ctx)),
            ActionKind::FunctionGrounding => parse::parse_string_list(sample)
                .map(|functions| artifacts.grounded_functions = functions),
            ActionKind::SqlGeneration | ActionKind::SqlRevision | ActionKind::End => None,
        };
        if parsed.is_some() {
            expansion.children.push(tree.alloc(parent, action, artifacts));
        } else {
            expansion.dropped += 1;
            tracing::debug!(
                question_id = ctx.task.question_id,
                %action,
                sample = %truncate(sample, 200),
                "dropping unparseable sample"
            );
        }
    }
    Ok(expansion)
}

fn ground_values(keywords: &[String], ctx: &SearchContext<'_>) -> Vec<GroundedValue> {
    let Some(index) = &ctx.values else {
        tracing::debug!(db_id = %ctx.task.db_id, "no value index; grounding is empty");
        return Vec::new();
    };

    let mut grounded: Vec<GroundedValue> = Vec::new();
    for keyword in keywords {
        for hit in index.query(keyword, ctx.settings.top_k) {
            if hit.similarity < ctx.settings.min_similarity {
                continue;
            }
            let duplicate = grounded.iter().any(|g| {
                g.table == hit.table && g.column == hit.column && g.value == hit.value
            });
            if !duplicate {
                grounded.push(GroundedValue {
                    keyword: keyword.clone(),
                    table: hit.table,
                    column: hit.column,
                    value: hit.value,
                    similarity: hit.similarity,
                });
            }
        }
    }
    grounded
}

fn sql_children(
    action: ActionKind,
    tree: &mut SearchTree,
    parent: NodeId,
    ctx: &SearchContext<'_>,
) -> Result<Expansion, SearchError> {
    let base = tree.node(parent).artifacts.clone();
    let feedback = if action == ActionKind::SqlRevision {
        base.sql_query
            .as_deref()
            .map(|sql| ctx.engine.cached_execute(&ctx.db_path, sql).summary())
    } else {
        None
    };
    let samples = ctx
        .oracle
        .request(&ctx.payload(action, &base, feedback), ctx.samples_for(action))?;

    let mut expansion = Expansion::default();
    let mut parsed: Vec<String> = Vec::with_capacity(samples.len());
    for sample in &samples {
        if let Some(sql) = parse::parse_sql(sample) {
            parsed.push(sql);
        } else {
            expansion.dropped += 1;
            tracing::debug!(
                question_id = ctx.task.question_id,
                %action,
                sample = %truncate(sample, 200),
                "dropping sample without SQL"
            );
        }
    }

    let group: Arc<[String]> = Arc::from(parsed);
    let reward = ctx.reward();
    for (own, sql) in group.iter().enumerate() {
        let mut artifacts = base.clone();
        artifacts.sql_query = Some(sql.clone());
        artifacts.final_sql_query = None;
        artifacts.consistency_score = None;

        let child = tree.alloc(parent, action, artifacts);
        let sample_group = SampleGroup {
            samples: Arc::clone(&group),
            own,
        };

        let finish = action == ActionKind::SqlRevision
            || ctx.engine.cached_execute(&ctx.db_path, sql).is_valid();
        if finish {
            let score = reward.consistency(&ctx.db_path, sql, sample_group.siblings());
            let end = alloc_end(tree, child, sql, score);
            tree.attach(child, vec![end])?;
        }
        tree.node_mut(child).sample_group = Some(sample_group);
        expansion.children.push(child);
    }
    Ok(expansion)
}

/// END chosen explicitly from a draft left open by generation.
fn end_from_open_draft(tree: &mut SearchTree, parent: NodeId, ctx: &SearchContext<'_>) -> Expansion {
    let node = tree.node(parent);
    let Some(sql) = node.artifacts.sql_query.clone() else {
        let artifacts = node.artifacts.clone();
        return Expansion {
            children: vec![tree.alloc(parent, ActionKind::End, artifacts)],
            dropped: 0,
        };
    };
    let score = node.sample_group.as_ref().map_or(0.0, |group| {
        ctx.reward()
            .consistency(&ctx.db_path, &sql, group.siblings())
    });
    Expansion {
        children: vec![alloc_end(tree, parent, &sql, score)],
        dropped: 0,
    }
}

fn alloc_end(tree: &mut SearchTree, parent: NodeId, sql: &str, score: f64) -> NodeId {
    let mut artifacts = tree.node(parent).artifacts.clone();
    artifacts.final_sql_query = Some(sql.to_string());
    artifacts.consistency_score = Some(score);
    tree.alloc(parent, ActionKind::End, artifacts)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(byte, _)| &text[..byte])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alder_core::Stage;

    #[test]
    fn used_kinds_are_not_offered_again() {
        let mut tree = SearchTree::new();
        let root = tree.root();
        let rephrased = tree.alloc(root, ActionKind::Rephrase, Artifacts::default());
        let selected = tree.alloc(rephrased, ActionKind::SchemaSelection, Artifacts::default());

        assert_eq!(
            legal_actions(&tree, selected, 6),
            vec![
                ActionKind::ValueGrounding,
                ActionKind::FunctionGrounding,
                ActionKind::SqlGeneration
            ]
        );
    }

    #[test]
    fn depth_limit_leaves_only_sql() {
        let mut tree = SearchTree::new();
        let root = tree.root();
        let rephrased = tree.alloc(root, ActionKind::Rephrase, Artifacts::default());
        assert_eq!(legal_actions(&tree, rephrased, 1), vec![ActionKind::SqlGeneration]);
        assert_eq!(
            legal_actions(&tree, root, 0),
            vec![ActionKind::SqlGeneration]
        );
    }

    #[test]
    fn end_stage_has_no_actions() {
        let mut tree = SearchTree::new();
        let root = tree.root();
        let sql = tree.alloc(root, ActionKind::SqlGeneration, Artifacts::default());
        let end = tree.alloc(sql, ActionKind::End, Artifacts::default());
        assert_eq!(tree.node(end).stage, Stage::End);
        assert!(legal_actions(&tree, end, 6).is_empty());
        assert_eq!(
            legal_actions(&tree, sql, 6),
            vec![ActionKind::SqlRevision, ActionKind::End]
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
