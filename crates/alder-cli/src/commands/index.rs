use alder_config::{AlderConfig, IndexConfig};
use alder_db::SchemaCache;
use alder_index::{IndexCache, ValueIndex};
use anyhow::Context;
use rayon::prelude::*;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::IndexArgs;
use crate::output::output;
use crate::progress::Progress;

#[derive(Debug, Serialize)]
struct IndexResponse {
    db_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Handle `alder index [<db_id> | --all]`.
pub async fn handle(
    args: &IndexArgs,
    config: &AlderConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let schemas = SchemaCache::new(&config.search.db_root_dir);
    let indices = IndexCache::new(&config.index.index_dir);
    let db_ids = if args.all {
        schemas.discover()?
    } else {
        vec![args.db_id.clone().context("pass a database id or --all")?]
    };

    let progress = Progress::bar(db_ids.len() as u64, "indexing");
    let index_config = config.index.clone();
    let responses = tokio::task::spawn_blocking(move || {
        let responses: Vec<IndexResponse> = db_ids
            .par_iter()
            .map(|db_id| {
                let response = match build_one(&schemas, &indices, &index_config, db_id) {
                    Ok((values, path)) => IndexResponse {
                        db_id: db_id.clone(),
                        values: Some(values),
                        path: Some(path),
                        error: None,
                    },
                    Err(error) => {
                        tracing::warn!(db_id, error = %format!("{error:#}"), "index build failed");
                        IndexResponse {
                            db_id: db_id.clone(),
                            values: None,
                            path: None,
                            error: Some(format!("{error:#}")),
                        }
                    }
                };
                progress.inc(1);
                response
            })
            .collect();
        progress.finish_clear();
        responses
    })
    .await
    .context("index workers panicked")?;

    output(&responses, flags.format)
}

fn build_one(
    schemas: &SchemaCache,
    indices: &IndexCache,
    config: &IndexConfig,
    db_id: &str,
) -> anyhow::Result<(usize, String)> {
    let schema = schemas.get(db_id)?;
    let db_path = schemas.db_path(db_id)?;
    let index = ValueIndex::build(&db_path, &schema, config)?;
    let values = index.len();
    let path = indices.store(db_id, index)?;
    Ok((values, path.display().to_string()))
}
