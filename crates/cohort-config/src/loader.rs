use std::path::{Path, PathBuf};

use config::{Config, Environment, File};

use crate::AppConfig;
use crate::error::Result;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "cohort.toml";

/// Prefix for environment overrides, e.g. `COHORT__COHORT__STRATEGY=sequential`.
pub const ENV_PREFIX: &str = "COHORT";

/// Loads, merges and validates configuration.
///
/// A missing file is not an error; defaults and environment overrides still
/// apply.
///
/// # Errors
///
/// Returns an error if the sources cannot be merged, the result does not
/// deserialize, or validation fails.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder();
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if file.exists() {
        tracing::debug!(path = %file.display(), "loading configuration file");
        builder = builder.add_source(File::from(file));
    } else if path.is_some() {
        tracing::warn!(path = %file.display(), "configuration file not found, using defaults");
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__"),
    );

    let merged: AppConfig = builder.build()?.try_deserialize()?;
    merged.validate()?;
    Ok(merged)
}
