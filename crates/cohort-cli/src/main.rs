mod cli;
mod commands;
mod observability;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cohort_config::loader::load_config;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    observability::init_tracing_with_level(&config.logging.level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Count(args) => commands::count::count(&config, args, format).await?,
        Commands::Plan(args) => commands::plan::plan(&config, args, format).await?,
        Commands::Anonymize(args) => commands::anonymize::anonymize(&config, args, format)?,
        Commands::Config => commands::config::show(&config, format)?,
    }

    Ok(())
}
