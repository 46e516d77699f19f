use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Cohort CLI: count patients, inspect query plans and export anonymized records")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./cohort.toml when present)
    #[arg(short, long, global = true, env = "COHORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count the patients matching a query definition
    Count(CountArgs),
    /// Hydrate and validate a query definition without running it
    Plan(PlanArgs),
    /// Anonymize a file of patient-level records
    Anonymize(AnonymizeArgs),
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct CallerArgs {
    /// Catalog snapshot (JSON) backing the in-memory store
    #[arg(long)]
    pub catalog: PathBuf,
    /// Query definition (JSON)
    #[arg(long)]
    pub query: PathBuf,
    /// Name of the requesting user
    #[arg(short, long, env = "COHORT_USER", default_value = "cli")]
    pub user: String,
    /// Groups the user belongs to
    #[arg(short, long, value_delimiter = ',')]
    pub groups: Vec<String>,
    /// Resolve references by universal id, as a federated peer would
    #[arg(long)]
    pub federated: bool,
}

#[derive(clap::Args)]
pub struct CountArgs {
    #[command(flatten)]
    pub caller: CallerArgs,
    /// Print the executed statements
    #[arg(long)]
    pub show_sql: bool,
}

#[derive(clap::Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub caller: CallerArgs,
}

#[derive(clap::Args)]
pub struct AnonymizeArgs {
    /// Shape of the input records (e.g. encounter, observation, dynamic)
    #[arg(short, long)]
    pub shape: String,
    /// JSON array of rows keyed by column name
    #[arg(short, long)]
    pub input: PathBuf,
    /// Field descriptors (JSON) for the dynamic shape
    #[arg(long)]
    pub schema: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_count_arguments() {
        let cli = Cli::try_parse_from([
            "cohort", "count", "--catalog", "catalog.json", "--query", "query.json", "-g", "research,genomics",
            "--federated", "--show-sql",
        ])
        .unwrap();
        let Commands::Count(args) = cli.command else {
            panic!("expected count");
        };
        assert_eq!(args.caller.groups, vec!["research", "genomics"]);
        assert!(args.caller.federated);
        assert!(args.show_sql);
    }
}
