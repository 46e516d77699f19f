//! # cohort-config
//!
//! Typed configuration for the cohort engine.
//!
//! Configuration is read from an optional TOML file and then overridden by
//! `COHORT__`-prefixed environment variables (`COHORT__COHORT__MAX_PARALLELISM=8`).
//! Every loaded configuration is validated before it is handed out.

mod error;
pub mod loader;
mod pepper;

use serde::{Deserialize, Serialize};

pub use error::{ConfigError, Result};
pub use pepper::{Pepper, REDACTED};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub compiler: CompilerOptions,
    #[serde(default)]
    pub cohort: CohortOptions,
    #[serde(default)]
    pub deidentification: DeidentificationOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Checks cross-field constraints the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.compiler.alias.is_empty() {
            return Err(ConfigError::validation("compiler.alias must not be empty"));
        }
        if self.compiler.field_person_id.is_empty() {
            return Err(ConfigError::validation(
                "compiler.field_person_id must not be empty",
            ));
        }
        if self.cohort.max_parallelism == 0 {
            return Err(ConfigError::validation("cohort.max_parallelism must be > 0"));
        }

        let obfuscation = &self.deidentification.cohort;
        if obfuscation.enabled && obfuscation.shift == 0 {
            return Err(ConfigError::validation(
                "deidentification.cohort.shift must be > 0 when obfuscation is enabled",
            ));
        }

        let patient = &self.deidentification.patient;
        let shifting = &patient.date_shifting;
        if shifting.lower_bound >= shifting.upper_bound {
            return Err(ConfigError::validation(
                "deidentification.patient.date_shifting.lower_bound must be < upper_bound",
            ));
        }
        if patient.enabled && patient.pepper.is_none() {
            return Err(ConfigError::validation(
                "deidentification.patient.enabled=true requires deidentification.patient.pepper",
            ));
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }

    /// Renders the effective configuration as TOML. The pepper is redacted.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::parse(e.to_string()))
    }
}

/// Names used when building SQL sets for saved queries and imports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerOptions {
    #[serde(default = "default_alias")]
    pub alias: String,
    #[serde(default = "default_app_db")]
    pub app_db: String,
    #[serde(default = "default_field_person_id")]
    pub field_person_id: String,
    #[serde(default = "default_field_encounter_id")]
    pub field_encounter_id: String,
}

fn default_alias() -> String {
    "_S".into()
}
fn default_app_db() -> String {
    "LeafDB".into()
}
fn default_field_person_id() -> String {
    "personId".into()
}
fn default_field_encounter_id() -> String {
    "encounterId".into()
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            app_db: default_app_db(),
            field_person_id: default_field_person_id(),
            field_encounter_id: default_field_encounter_id(),
        }
    }
}

/// How per-panel partial queries are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    Sequential,
    #[default]
    Parallel,
    /// One statement for the whole query; no per-panel aggregation.
    Combined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortOptions {
    #[serde(default)]
    pub strategy: ExecutionStrategy,
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,
}

fn default_max_parallelism() -> usize {
    4
}

impl Default for CohortOptions {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::default(),
            max_parallelism: default_max_parallelism(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeidentificationOptions {
    #[serde(default)]
    pub cohort: ObfuscationOptions,
    #[serde(default)]
    pub patient: PatientDeidentificationOptions,
}

/// Count obfuscation settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObfuscationOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Counts at or below this are never revealed.
    #[serde(default = "default_threshold")]
    pub threshold: u64,
    /// Maximum perturbation, also reported in place of suppressed counts.
    #[serde(default = "default_shift")]
    pub shift: u64,
}

fn default_true() -> bool {
    true
}
fn default_threshold() -> u64 {
    10
}
fn default_shift() -> u64 {
    10
}

impl Default for ObfuscationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            shift: default_shift(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatientDeidentificationOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub pepper: Option<Pepper>,
    #[serde(default)]
    pub date_shifting: DateShiftOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateShiftIncrement {
    #[serde(alias = "MINUTE")]
    Minute,
    #[default]
    #[serde(alias = "HOUR")]
    Hour,
    #[serde(alias = "DAY")]
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateShiftOptions {
    #[serde(default)]
    pub increment: DateShiftIncrement,
    #[serde(default = "default_lower_bound")]
    pub lower_bound: i32,
    #[serde(default = "default_upper_bound")]
    pub upper_bound: i32,
}

fn default_lower_bound() -> i32 {
    -1000
}
fn default_upper_bound() -> i32 {
    1000
}

impl Default for DateShiftOptions {
    fn default() -> Self {
        Self {
            increment: DateShiftIncrement::default(),
            lower_bound: default_lower_bound(),
            upper_bound: default_upper_bound(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
