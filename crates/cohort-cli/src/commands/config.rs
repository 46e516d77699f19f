use anyhow::{Context, Result};
use cohort_config::AppConfig;

use crate::cli::OutputFormat;
use crate::output::print_json;

/// Prints the merged configuration. The pepper serializes redacted.
pub fn show(config: &AppConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Table => {
            let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
    }
}
