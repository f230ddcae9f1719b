use alder_config::AlderConfig;

use crate::cli::{Commands, GlobalFlags};

pub mod exec;
pub mod index;
pub mod paths;
pub mod schema;
pub mod solve;

/// Route a parsed command to its handler.
pub async fn dispatch(
    command: Commands,
    config: AlderConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Solve(args) => solve::handle(&args, config, flags).await,
        Commands::Index(args) => index::handle(&args, &config, flags).await,
        Commands::Exec(args) => exec::handle(&args, &config, flags).await,
        Commands::Schema(args) => schema::handle(&args, &config, flags),
        Commands::Paths(args) => paths::handle(&args, flags),
    }
}
