use std::collections::BTreeSet;
use std::path::Path;

use alder_core::{ActionKind, final_sql};
use alder_search::load_paths;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::PathsArgs;
use crate::output::output;

#[derive(Debug, Serialize, PartialEq)]
struct PathsSummary {
    file: String,
    paths: usize,
    distinct_final_sql: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    best: Option<BestPath>,
}

#[derive(Debug, Serialize, PartialEq)]
struct BestPath {
    final_sql: String,
    consistency_score: f64,
    visits: u64,
    actions: Vec<ActionKind>,
}

/// Handle `alder paths <file>`.
pub fn handle(args: &PathsArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    let summary = summarize(Path::new(&args.file))?;
    output(&summary, flags.format)
}

/// Path count, distinct final SQL, and the path with the highest
/// consistency (visit count breaks ties).
fn summarize(file: &Path) -> anyhow::Result<PathsSummary> {
    let paths = load_paths(file)?;

    let distinct: BTreeSet<&str> = paths.iter().filter_map(|p| final_sql(p)).collect();

    let best = paths
        .iter()
        .filter_map(|path| {
            let end = path.last()?;
            let sql = final_sql(path)?;
            Some((path, end, sql))
        })
        .max_by(|(_, a, _), (_, b, _)| {
            let score = |n: &alder_core::NodeSnapshot| n.artifacts.consistency_score.unwrap_or(0.0);
            score(a).total_cmp(&score(b)).then(a.n.cmp(&b.n))
        })
        .map(|(path, end, sql)| BestPath {
            final_sql: sql.to_string(),
            consistency_score: end.artifacts.consistency_score.unwrap_or(0.0),
            visits: end.n,
            actions: path.iter().filter_map(|n| n.parent_action).collect(),
        });

    Ok(PathsSummary {
        file: file.display().to_string(),
        paths: paths.len(),
        distinct_final_sql: distinct.len(),
        best,
    })
}
