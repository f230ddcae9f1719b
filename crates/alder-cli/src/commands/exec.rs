use std::time::Duration;

use alder_config::AlderConfig;
use alder_db::{ExecutionEngine, SchemaCache};
use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ExecArgs;
use crate::output::output;
use crate::progress::Progress;

/// Handle `alder exec <db_id> <sql>`.
pub async fn handle(
    args: &ExecArgs,
    config: &AlderConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let schemas = SchemaCache::new(&config.search.db_root_dir);
    let db_path = schemas.db_path(&args.db_id)?;
    if !db_path.is_file() {
        anyhow::bail!("database '{}' not found at {}", args.db_id, db_path.display());
    }

    let engine = ExecutionEngine::from_config(&config.reward);
    let timeout = args
        .timeout_ms
        .map_or(engine.options().timeout, Duration::from_millis);
    let sql = args.sql.clone();
    let spinner = Progress::spinner("executing");
    let result = tokio::task::spawn_blocking(move || {
        engine.execute_with_timeout(&db_path, &sql, timeout)
    })
    .await
    .context("query worker failed")?;
    spinner.finish_clear();

    output(&result, flags.format)
}
