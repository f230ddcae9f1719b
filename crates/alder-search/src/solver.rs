//! Monte Carlo tree search over action sequences.

use std::time::Instant;

use alder_core::{SearchPath, Task};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::action::{SearchContext, create_children, legal_actions};
use crate::error::SearchError;
use crate::node::{NodeId, SearchTree};

/// Per-task search statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub question_id: u64,
    pub db_id: String,
    pub rollouts: u32,
    pub nodes: usize,
    pub end_paths: usize,
    pub dropped_samples: usize,
    pub oracle_calls: usize,
    /// Process-wide execution memo hit ratio when the task finished.
    pub cache_hit_ratio: f64,
    pub elapsed_ms: u64,
}

/// Search result for one task.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub paths: Vec<SearchPath>,
    pub report: SolveReport,
}

/// One search tree and the policy driving it.
pub struct MctsSolver<'a> {
    ctx: SearchContext<'a>,
    tree: SearchTree,
    rng: StdRng,
    dropped_samples: usize,
    oracle_calls: usize,
}

impl<'a> MctsSolver<'a> {
    /// A solver seeded with `random_seed + question_id`.
    #[must_use]
    pub fn new(ctx: SearchContext<'a>, random_seed: u64) -> Self {
        let seed = random_seed.wrapping_add(ctx.task.question_id);
        Self {
            ctx,
            tree: SearchTree::new(),
            rng: StdRng::seed_from_u64(seed),
            dropped_samples: 0,
            oracle_calls: 0,
        }
    }

    #[must_use]
    pub const fn tree(&self) -> &SearchTree {
        &self.tree
    }

    #[must_use]
    pub fn task(&self) -> &Task {
        self.ctx.task
    }

    /// Run up to `budget` rollouts and return every ROOT → END path found.
    ///
    /// # Errors
    ///
    /// Oracle failures abort the search.
    pub fn solve(&mut self, budget: u32) -> Result<SolveOutcome, SearchError> {
        let started = Instant::now();
        let root = self.tree.root();
        let mut rollouts = 0;

        for rollout in 0..budget {
            if self.tree.node(root).is_terminal() {
                tracing::debug!(
                    question_id = self.ctx.task.question_id,
                    rollout,
                    "search space exhausted"
                );
                break;
            }

            let leaf = self.select(root);
            let end = if self.tree.node(leaf).is_terminal() {
                leaf
            } else {
                self.expand(leaf)?;
                let picked = self.tree.node(leaf).children().choose(&mut self.rng).copied();
                match picked {
                    Some(child) => self.simulate(child)?,
                    None => leaf,
                }
            };
            let reward = self.backpropagate(end);
            rollouts += 1;

            tracing::debug!(
                question_id = self.ctx.task.question_id,
                rollout,
                stage = %self.tree.node(end).stage,
                reward,
                "rollout finished"
            );
        }

        let paths = self.extract_paths();
        let report = SolveReport {
            question_id: self.ctx.task.question_id,
            db_id: self.ctx.task.db_id.clone(),
            rollouts,
            nodes: self.tree.len(),
            end_paths: paths.len(),
            dropped_samples: self.dropped_samples,
            oracle_calls: self.oracle_calls,
            cache_hit_ratio: self.ctx.engine.stats().hit_ratio(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        Ok(SolveOutcome { paths, report })
    }

    /// Descend from `from` to a leaf.
    ///
    /// Non-terminal children are preferred over terminal ones. Among the
    /// preferred set, the first unvisited child wins; otherwise the UCT
    /// maximum, with ties going to the earliest child.
    pub fn select(&self, from: NodeId) -> NodeId {
        let mut current = from;
        loop {
            let node = self.tree.node(current);
            if node.is_terminal() || node.children().is_empty() {
                return current;
            }

            let open: Vec<NodeId> = node
                .children()
                .iter()
                .copied()
                .filter(|&c| !self.tree.node(c).is_terminal())
                .collect();
            let candidates = if open.is_empty() {
                node.children()
            } else {
                open.as_slice()
            };

            current = candidates
                .iter()
                .copied()
                .find(|&c| self.tree.node(c).n == 0)
                .unwrap_or_else(|| self.best_uct(node.n, candidates));
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn best_uct(&self, parent_visits: u64, candidates: &[NodeId]) -> NodeId {
        let c = self.ctx.settings.exploration_constant;
        let ln_parent = (parent_visits.max(1) as f64).ln();
        let mut best = candidates[0];
        let mut best_value = f64::NEG_INFINITY;
        for &id in candidates {
            let child = self.tree.node(id);
            let n = child.n as f64;
            let value = child.q / n + c * (ln_parent / n).sqrt();
            if value > best_value {
                best = id;
                best_value = value;
            }
        }
        best
    }

    /// Populate the children of `node` from every legal action.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::AlreadyExpanded`] if `node` already has
    /// children, and propagates oracle failures.
    pub fn expand(&mut self, node: NodeId) -> Result<(), SearchError> {
        if self.tree.node(node).is_expanded() {
            return Err(SearchError::AlreadyExpanded(node.index()));
        }

        let mut children = Vec::new();
        for action in legal_actions(&self.tree, node, self.ctx.settings.max_depth) {
            let expansion = create_children(action, &mut self.tree, node, &self.ctx)?;
            if action != alder_core::ActionKind::End {
                self.oracle_calls += 1;
            }
            self.dropped_samples += expansion.dropped;
            children.extend(expansion.children);
        }
        children.shuffle(&mut self.rng);

        tracing::debug!(
            question_id = self.ctx.task.question_id,
            stage = %self.tree.node(node).stage,
            children = children.len(),
            "expanded"
        );
        self.tree.attach(node, children)
    }

    /// Random descent from `node` until an END or childless node.
    ///
    /// # Errors
    ///
    /// Propagates expansion failures.
    pub fn simulate(&mut self, node: NodeId) -> Result<NodeId, SearchError> {
        let mut current = node;
        loop {
            if self.tree.node(current).is_terminal() {
                return Ok(current);
            }
            if !self.tree.node(current).is_expanded() {
                self.expand(current)?;
            }
            let picked = self.tree.node(current).children().choose(&mut self.rng).copied();
            match picked {
                Some(child) => current = child,
                None => return Ok(current),
            }
        }
    }

    /// Credit the reward of `end` to it and every ancestor. Returns the
    /// reward applied.
    ///
    /// A first visit scores the node; later visits reuse its mean value.
    /// Unscoreable nodes contribute zero.
    pub fn backpropagate(&mut self, end: NodeId) -> f64 {
        let node = self.tree.node(end);
        #[allow(clippy::cast_precision_loss)]
        let reward = if node.n == 0 {
            self.ctx.reward().score(node)
        } else {
            node.q / node.n as f64
        };
        let reward = if reward.is_finite() { reward } else { 0.0 };

        let mut current = Some(end);
        while let Some(id) = current {
            let node = self.tree.node_mut(id);
            node.n += 1;
            node.q += reward;
            current = node.parent;
        }
        reward
    }

    /// Snapshot paths for every END node in the tree.
    #[must_use]
    pub fn extract_paths(&self) -> Vec<SearchPath> {
        self.tree
            .end_nodes()
            .into_iter()
            .map(|end| self.tree.snapshot_path(end))
            .collect()
    }
}
