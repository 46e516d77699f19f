pub mod anonymize;
pub mod config;
pub mod count;
pub mod plan;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cohort_config::AppConfig;
use cohort_core::{QueryDefinition, UserContext};
use cohort_db_memory::{CatalogSnapshot, SharedStore, create_store};
use cohort_engine::PatientCountService;
use serde::de::DeserializeOwned;

use crate::cli::CallerArgs;

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Everything a count or plan needs: the backing store, the caller and
/// their definition.
pub(crate) struct Request {
    pub store: SharedStore,
    pub definition: QueryDefinition,
    pub user: UserContext,
}

impl Request {
    pub fn load(args: &CallerArgs, config: &AppConfig) -> Result<Self> {
        let snapshot: CatalogSnapshot = read_json(&args.catalog)?;
        let definition: QueryDefinition = read_json(&args.query)?;

        let user = if args.federated {
            UserContext::federated(args.user.clone())
        } else {
            UserContext::institutional(args.user.clone())
        }
        .with_groups(args.groups.iter().cloned());

        if !definition.fits(user.mode) {
            anyhow::bail!(
                "Query references do not fit a {} caller; use {} references",
                user.mode,
                if args.federated { "universal id" } else { "local id" }
            );
        }

        Ok(Self {
            store: create_store(snapshot, config.compiler.clone()),
            definition,
            user,
        })
    }

    pub fn service(&self, config: &AppConfig) -> Result<PatientCountService> {
        PatientCountService::from_config(
            config,
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
        )
        .context("Failed to build count service")
    }
}
