//! Batch execution: one solver per task on a rayon worker pool.

use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alder_config::AlderConfig;
use alder_core::{SearchPath, Task};
use alder_db::{ExecutionEngine, SchemaCache};
use alder_index::IndexCache;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::action::{SearchContext, SearchSettings};
use crate::error::SearchError;
use crate::oracle::Oracle;
use crate::solver::{MctsSolver, SolveReport};

/// Name of the per-batch configuration snapshot in the output directory.
pub const CONFIG_SNAPSHOT: &str = "config.json";

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Solved { report: SolveReport },
    AlreadyDone { question_id: u64 },
    Failed { question_id: u64, reason: String },
}

impl TaskStatus {
    #[must_use]
    pub const fn question_id(&self) -> u64 {
        match self {
            Self::Solved { report } => report.question_id,
            Self::AlreadyDone { question_id } | Self::Failed { question_id, .. } => *question_id,
        }
    }
}

/// A task that produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTask {
    pub question_id: u64,
    pub reason: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub solved: Vec<SolveReport>,
    /// Tasks whose output already existed.
    pub already_done: Vec<u64>,
    pub skipped: Vec<SkippedTask>,
}

impl BatchSummary {
    fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Solved { report } => self.solved.push(report),
            TaskStatus::AlreadyDone { question_id } => self.already_done.push(question_id),
            TaskStatus::Failed {
                question_id,
                reason,
            } => self.skipped.push(SkippedTask {
                question_id,
                reason,
            }),
        }
    }
}

#[derive(Serialize)]
struct ConfigSnapshot<'a> {
    created_at: DateTime<Utc>,
    config: &'a AlderConfig,
}

/// Shared services plus the configuration for a batch.
pub struct TaskRunner {
    config: AlderConfig,
    schemas: Arc<SchemaCache>,
    indices: Arc<IndexCache>,
    engine: Arc<ExecutionEngine>,
    oracle: Arc<dyn Oracle>,
    save_root: PathBuf,
}

impl TaskRunner {
    /// Build the process-wide caches from `config`.
    #[must_use]
    pub fn new(config: AlderConfig, oracle: Arc<dyn Oracle>) -> Self {
        let schemas = Arc::new(SchemaCache::new(&config.search.db_root_dir));
        let indices = Arc::new(IndexCache::new(&config.index.index_dir));
        let engine = Arc::new(ExecutionEngine::from_config(&config.reward));
        Self::with_services(config, schemas, indices, engine, oracle)
    }

    #[must_use]
    pub fn with_services(
        config: AlderConfig,
        schemas: Arc<SchemaCache>,
        indices: Arc<IndexCache>,
        engine: Arc<ExecutionEngine>,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        let save_root = PathBuf::from(&config.search.save_root_dir);
        Self {
            config,
            schemas,
            indices,
            engine,
            oracle,
            save_root,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AlderConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// `<save_root_dir>/<question_id>.json`.
    #[must_use]
    pub fn output_path(&self, question_id: u64) -> PathBuf {
        self.save_root.join(format!("{question_id}.json"))
    }

    /// Write the configuration snapshot for this batch.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Io`] if the output directory is not writable.
    pub fn write_config_snapshot(&self) -> Result<PathBuf, SearchError> {
        let path = self.save_root.join(CONFIG_SNAPSHOT);
        let snapshot = ConfigSnapshot {
            created_at: Utc::now(),
            config: &self.config,
        };
        write_json_atomic(&path, &snapshot)?;
        Ok(path)
    }

    /// Search one task and persist its paths.
    ///
    /// # Errors
    ///
    /// Fails on unknown databases, oracle failures, and output write errors.
    /// Nothing is written on failure.
    pub fn solve_one(&self, task: &Task) -> Result<SolveReport, SearchError> {
        let schema = self.schemas.get(&task.db_id)?;
        let db_path = self.schemas.db_path(&task.db_id)?;
        let values = self.indices.get(&task.db_id)?;

        let ctx = SearchContext {
            task,
            schema,
            db_path,
            engine: &self.engine,
            oracle: self.oracle.as_ref(),
            values,
            settings: SearchSettings::from(&self.config),
        };
        let mut solver = MctsSolver::new(ctx, self.config.search.random_seed);
        let outcome = solver.solve(self.config.search.max_rollout_steps)?;

        write_json_atomic(&self.output_path(task.question_id), &outcome.paths)?;
        tracing::info!(
            question_id = task.question_id,
            db_id = %task.db_id,
            paths = outcome.report.end_paths,
            rollouts = outcome.report.rollouts,
            "task solved"
        );
        Ok(outcome.report)
    }

    /// Run one task with failure isolation: errors and panics become
    /// [`TaskStatus::Failed`].
    #[must_use]
    pub fn run_task(&self, task: &Task) -> TaskStatus {
        if !self.config.runner.overwrite && self.output_path(task.question_id).is_file() {
            tracing::debug!(question_id = task.question_id, "output exists; skipping");
            return TaskStatus::AlreadyDone {
                question_id: task.question_id,
            };
        }

        match catch_unwind(AssertUnwindSafe(|| self.solve_one(task))) {
            Ok(Ok(report)) => TaskStatus::Solved { report },
            Ok(Err(error)) => {
                tracing::error!(question_id = task.question_id, %error, "task failed");
                TaskStatus::Failed {
                    question_id: task.question_id,
                    reason: error.to_string(),
                }
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!(question_id = task.question_id, %reason, "task panicked");
                TaskStatus::Failed {
                    question_id: task.question_id,
                    reason: format!("panic: {reason}"),
                }
            }
        }
    }

    /// Solve `tasks` on `runner.workers` threads. `on_done` is called from
    /// worker threads as each task finishes.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Runner`] if the pool cannot be built and
    /// [`SearchError::Io`] if the configuration snapshot cannot be written.
    /// Individual task failures never abort the batch.
    pub fn run<F>(&self, tasks: &[Task], on_done: F) -> Result<BatchSummary, SearchError>
    where
        F: Fn(&TaskStatus) + Sync,
    {
        self.write_config_snapshot()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.runner.workers)
            .thread_name(|i| format!("alder-worker-{i}"))
            .build()
            .map_err(|e| SearchError::Runner(e.to_string()))?;

        let statuses: Vec<TaskStatus> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let status = self.run_task(task);
                    on_done(&status);
                    status
                })
                .collect()
        });

        let mut summary = BatchSummary::default();
        for status in statuses {
            summary.record(status);
        }
        tracing::info!(
            solved = summary.solved.len(),
            already_done = summary.already_done.len(),
            skipped = summary.skipped.len(),
            "batch finished"
        );
        Ok(summary)
    }
}

/// Load the paths persisted for one task.
///
/// # Errors
///
/// Returns [`SearchError::Io`] or [`SearchError::Json`].
pub fn load_paths(path: &Path) -> Result<Vec<SearchPath>, SearchError> {
    let raw = std::fs::read(path).map_err(|source| SearchError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Serialize `value` next to `path` and rename it into place.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SearchError> {
    let io_err = |source| SearchError::Io {
        path: path.display().to_string(),
        source,
    };
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(io_err)?;

    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n").map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn atomic_write_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("1.json");
        write_json_atomic(&path, &vec![1, 2]).unwrap();
        write_json_atomic(&path, &vec![3]).unwrap();
        let back: Vec<u8> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, vec![3]);
    }

    #[test]
    fn summary_buckets_statuses() {
        let mut summary = BatchSummary::default();
        summary.record(TaskStatus::AlreadyDone { question_id: 1 });
        summary.record(TaskStatus::Failed {
            question_id: 2,
            reason: "database error".into(),
        });
        assert_eq!(summary.already_done, vec![1]);
        assert_eq!(summary.skipped[0].question_id, 2);
        assert!(summary.solved.is_empty());
    }
}
