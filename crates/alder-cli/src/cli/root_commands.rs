use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Search SQL candidates for a batch of questions.
    Solve(SolveArgs),
    /// Build value indices for grounding literals.
    Index(IndexArgs),
    /// Run one read-only query with the configured timeout.
    Exec(ExecArgs),
    /// Print the schema of a database.
    Schema(SchemaArgs),
    /// Summarize a persisted search output file.
    Paths(PathsArgs),
}

#[derive(Clone, Debug, Args)]
pub struct SolveArgs {
    /// JSON array of tasks (`question_id`, `db_id`, `question`, `evidence`).
    pub tasks: String,

    /// Only solve the first N tasks (after filtering).
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only solve these question ids (repeatable).
    #[arg(long = "question-id")]
    pub question_ids: Vec<u64>,

    /// Re-solve tasks whose output file already exists.
    #[arg(long)]
    pub force: bool,

    /// Worker threads (overrides runner.workers).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Rollouts per task (overrides search.max_rollout_steps).
    #[arg(long)]
    pub rollouts: Option<u32>,
}

#[derive(Clone, Debug, Args)]
pub struct IndexArgs {
    /// Database id under `search.db_root_dir`. Omit with --all.
    pub db_id: Option<String>,

    /// Index every database found under `search.db_root_dir`.
    #[arg(long, conflicts_with = "db_id")]
    pub all: bool,
}

#[derive(Clone, Debug, Args)]
pub struct ExecArgs {
    pub db_id: String,

    pub sql: String,

    /// Timeout in milliseconds (overrides reward.execution_timeout_ms).
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Args)]
pub struct SchemaArgs {
    pub db_id: String,

    /// Restrict output to these tables (repeatable).
    #[arg(long = "table")]
    pub tables: Vec<String>,
}

#[derive(Clone, Debug, Args)]
pub struct PathsArgs {
    /// `<save_root_dir>/<question_id>.json` produced by `alder solve`.
    pub file: String,
}
