use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `alder` binary.
#[derive(Debug, Parser)]
#[command(name = "alder", version, about = "Alder - MCTS text-to-SQL search")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only, no progress)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra TOML config file, layered above user and project config
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, GlobalFlags, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::try_parse_from([
            "alder",
            "--format",
            "raw",
            "--verbose",
            "schema",
            "california_schools",
        ])
        .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Schema(ref args) if args.db_id == "california_schools"));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["alder", "paths", "out/12.json", "--quiet"])
            .expect("cli should parse");
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Paths(_)));
    }

    #[test]
    fn solve_filters_parse() {
        let cli = Cli::try_parse_from([
            "alder",
            "solve",
            "dev.json",
            "--question-id",
            "3",
            "--question-id",
            "9",
            "--limit",
            "1",
            "--force",
        ])
        .expect("cli should parse");
        let Commands::Solve(args) = cli.command else {
            panic!("expected solve");
        };
        assert_eq!(args.question_ids, vec![3, 9]);
        assert_eq!(args.limit, Some(1));
        assert!(args.force);
    }

    #[test]
    fn index_rejects_db_id_with_all() {
        assert!(Cli::try_parse_from(["alder", "index", "shop", "--all"]).is_err());
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        assert!(Cli::try_parse_from(["alder", "--format", "table", "schema", "x"]).is_err());
    }

    #[test]
    fn global_flags_extraction_copies_values() {
        let cli = Cli::try_parse_from(["alder", "--config", "run.toml", "schema", "x"])
            .expect("cli should parse");
        let flags: GlobalFlags = cli.global_flags();
        assert_eq!(flags.config.as_deref(), Some("run.toml"));
    }
}
