use std::path::Path;
use std::sync::Arc;

use alder_config::AlderConfig;
use alder_core::task::load_tasks;
use alder_search::{TaskRunner, TaskStatus};
use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SolveArgs;
use crate::oracle_http::HttpOracle;
use crate::output::output;
use crate::progress::Progress;

/// Handle `alder solve <tasks.json>`.
pub async fn handle(
    args: &SolveArgs,
    mut config: AlderConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    if let Some(workers) = args.workers {
        config.runner.workers = workers;
    }
    if let Some(rollouts) = args.rollouts {
        config.search.max_rollout_steps = rollouts;
    }
    if args.force {
        config.runner.overwrite = true;
    }
    config.validate()?;

    let mut tasks = load_tasks(Path::new(&args.tasks))
        .with_context(|| format!("failed to load tasks from {}", args.tasks))?;
    if !args.question_ids.is_empty() {
        tasks.retain(|task| args.question_ids.contains(&task.question_id));
    }
    if let Some(limit) = args.limit {
        tasks.truncate(limit);
    }
    if tasks.is_empty() {
        anyhow::bail!("no tasks selected");
    }

    let oracle = HttpOracle::new(&config.oracle, tokio::runtime::Handle::current())
        .context("cannot reach the oracle")?;
    let runner = TaskRunner::new(config, Arc::new(oracle));
    let progress = Progress::bar(tasks.len() as u64, "solving");

    let summary = tokio::task::spawn_blocking(move || {
        let summary = runner.run(&tasks, |status| {
            progress.inc(1);
            if let TaskStatus::Failed { question_id, .. } = status {
                progress.set_message(&format!("question {question_id} failed"));
            }
        });
        progress.finish_clear();
        summary
    })
    .await
    .context("solver pool panicked")??;

    output(&summary, flags.format)
}
