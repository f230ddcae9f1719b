//! Reward by execution consistency.
//!
//! A SQL candidate scores the fraction of its valid sibling samples that
//! return the same rows, compared as an order- and duplicate-insensitive set.

use std::path::Path;

use alder_db::ExecutionEngine;

use crate::node::SearchNode;

/// Stateless scorer over a shared [`ExecutionEngine`].
#[derive(Clone, Copy)]
pub struct RewardModel<'a> {
    engine: &'a ExecutionEngine,
}

impl<'a> RewardModel<'a> {
    #[must_use]
    pub const fn new(engine: &'a ExecutionEngine) -> Self {
        Self { engine }
    }

    /// Agreement of `own_sql` with `siblings` on `db_path`, in `[0, 1]`.
    ///
    /// Zero when `own_sql` does not produce a valid result or when no
    /// sibling does.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn consistency<'s>(
        &self,
        db_path: &Path,
        own_sql: &str,
        siblings: impl IntoIterator<Item = &'s str>,
    ) -> f64 {
        let own = self.engine.cached_execute(db_path, own_sql);
        if !own.is_valid() {
            return 0.0;
        }
        let Some(own_rows) = own.frozen_rows() else {
            return 0.0;
        };

        let mut valid = 0_usize;
        let mut agreeing = 0_usize;
        for sql in siblings {
            let result = self.engine.cached_execute(db_path, sql);
            if !result.is_valid() {
                continue;
            }
            valid += 1;
            if result.frozen_rows().as_ref() == Some(&own_rows) {
                agreeing += 1;
            }
        }

        if valid == 0 {
            0.0
        } else {
            agreeing as f64 / valid as f64
        }
    }

    /// Reward for a rollout ending at `node`.
    ///
    /// The consistency score recorded when the END node was built, or
    /// `f64::NEG_INFINITY` when the node carries no final SQL.
    #[must_use]
    pub fn score(&self, node: &SearchNode) -> f64 {
        match (
            &node.artifacts.final_sql_query,
            node.artifacts.consistency_score,
        ) {
            (None, _) => f64::NEG_INFINITY,
            (Some(_), Some(score)) => score,
            (Some(_), None) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alder_db::ExecutionOptions;
    use rusqlite::Connection;

    fn orders_db() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, status TEXT);
             INSERT INTO orders (status) VALUES ('open'), ('open'), ('closed');",
        )
        .unwrap();
        (dir, path)
    }

    fn engine() -> ExecutionEngine {
        ExecutionEngine::new(ExecutionOptions::default(), 64)
    }

    #[test]
    fn agreeing_valid_siblings_score_one() {
        let (_dir, path) = orders_db();
        let engine = engine();
        let model = RewardModel::new(&engine);
        let siblings = [
            "SELECT count(*) FROM orders",
            "SELECT COUNT(id) FROM orders",
            "SELECT count(*) FROM orders WHERE 1",
            "SELECT nope FROM orders",
            "SELECT status FROM orders WHERE 0",
        ];
        let score = model.consistency(&path, "SELECT count(*) FROM orders", siblings);
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_agreement_is_a_fraction() {
        let (_dir, path) = orders_db();
        let engine = engine();
        let model = RewardModel::new(&engine);
        let siblings = [
            "SELECT count(*) FROM orders",
            "SELECT count(*) FROM orders WHERE status = 'open'",
        ];
        let score = model.consistency(&path, "SELECT count(*) FROM orders", siblings);
        assert!((score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn row_order_does_not_matter() {
        let (_dir, path) = orders_db();
        let engine = engine();
        let model = RewardModel::new(&engine);
        let score = model.consistency(
            &path,
            "SELECT status FROM orders ORDER BY id",
            ["SELECT DISTINCT status FROM orders ORDER BY status DESC"],
        );
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_own_sql_scores_zero() {
        let (_dir, path) = orders_db();
        let engine = engine();
        let model = RewardModel::new(&engine);
        let score = model.consistency(
            &path,
            "SELECT missing FROM orders",
            ["SELECT count(*) FROM orders"],
        );
        assert!(score.abs() < f64::EPSILON);
    }

    #[test]
    fn no_valid_siblings_scores_zero() {
        let (_dir, path) = orders_db();
        let engine = engine();
        let model = RewardModel::new(&engine);
        let score = model.consistency(&path, "SELECT count(*) FROM orders", std::iter::empty());
        assert!(score.abs() < f64::EPSILON);
    }
}
