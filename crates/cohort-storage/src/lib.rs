//! # cohort-storage
//!
//! Collaborator abstractions for the cohort pipeline.
//!
//! This crate defines the traits the pipeline consumes. It does not contain
//! any implementations; see `cohort-db-memory` for an in-memory backend.
//!
//! ## Overview
//!
//! - [`PreflightResourceReader`]: presence and authorization of referenced resources
//! - [`PanelCompiler`]: panels and whole queries to executable statements
//! - [`QueryExecutor`]: statements to streams of patient ids
//! - [`CohortCache`]: persistence of final cohorts as unsaved queries

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{CohortCache, PanelCompiler, PatientIdStream, PreflightResourceReader, QueryExecutor};
pub use types::CompiledStatement;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

pub type DynPreflightReader = std::sync::Arc<dyn PreflightResourceReader>;
pub type DynPanelCompiler = std::sync::Arc<dyn PanelCompiler>;
pub type DynQueryExecutor = std::sync::Arc<dyn QueryExecutor>;
pub type DynCohortCache = std::sync::Arc<dyn CohortCache>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        CohortCache, CompiledStatement, DynCohortCache, DynPanelCompiler, DynPreflightReader,
        DynQueryExecutor, PanelCompiler, PatientIdStream, PreflightResourceReader, QueryExecutor,
        StorageError, StorageResult,
    };
}
