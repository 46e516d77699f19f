//! In-memory backend for the cohort pipeline.
//!
//! [`InMemoryStore`] implements every collaborator trait from
//! `cohort-storage` on top of `dashmap` maps: the preflight reader, the panel
//! compiler, the query executor and the cohort cache. It is used by the CLI
//! and by tests.
//!
//! Date filters, numeric filters and sub-panel sequences are rendered into
//! the statement text but not evaluated; a concept matches exactly the
//! patients listed for it in the catalog.
//!
//! # Example
//!
//! ```ignore
//! use cohort_db_memory::{CatalogSnapshot, create_store};
//!
//! let snapshot: CatalogSnapshot = serde_json::from_str(&json)?;
//! let store = create_store(snapshot, CompilerOptions::default());
//! let resources = store.check(&refs, &user).await?;
//! ```

mod cache;
mod compiler;
mod executor;
mod preflight;
pub mod store;

pub use store::{
    Access, CachedCohort, CatalogConcept, CatalogSnapshot, GlobalFilterEntry, ImportDataset, ImportRow,
    InMemoryStore, SavedQuery,
};

use std::sync::Arc;

use cohort_config::CompilerOptions;

/// Type alias for a shareable in-memory store.
pub type SharedStore = Arc<InMemoryStore>;

/// Creates a shareable store loaded from `snapshot`.
pub fn create_store(snapshot: CatalogSnapshot, options: CompilerOptions) -> SharedStore {
    Arc::new(InMemoryStore::from_snapshot(snapshot, options))
}
