//! Collaborator traits consumed by the cohort pipeline.
//!
//! The pipeline never talks to a database directly. Authorization lookups,
//! statement compilation, execution and result caching all go through the
//! traits below so that backends can be swapped freely.

use async_trait::async_trait;
use cohort_core::{Panel, PatientCohort, PatientCountQuery, PreflightResources, ResourceRefs, UserContext};
use futures_util::stream::BoxStream;
use uuid::Uuid;

use crate::error::StorageError;
use crate::types::CompiledStatement;

/// Stream of patient identifiers produced by executing one statement.
pub type PatientIdStream = BoxStream<'static, Result<String, StorageError>>;

/// Reports presence and authorization for every referenced resource.
///
/// Implementations must be idempotent and free of side effects.
///
/// # Example
///
/// ```ignore
/// use cohort_storage::{PreflightResourceReader, StorageError};
///
/// async fn can_run(reader: &dyn PreflightResourceReader, refs: &ResourceRefs, user: &UserContext)
///     -> Result<bool, StorageError>
/// {
///     Ok(reader.check(refs, user).await?.ok())
/// }
/// ```
#[async_trait]
pub trait PreflightResourceReader: Send + Sync {
    /// Checks all references in one call.
    ///
    /// References are resolved according to `user.mode`: institutional callers
    /// by local id, federated callers by universal id. A reference of the other
    /// form is reported as not present. Global panel filters applying to the
    /// caller are returned alongside the results.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues. Missing or
    /// unauthorized resources are reported in the result.
    async fn check(
        &self,
        refs: &ResourceRefs,
        user: &UserContext,
    ) -> Result<PreflightResources, StorageError>;
}

/// Turns validated panels into executable statements.
pub trait PanelCompiler: Send + Sync {
    /// Compiles one panel into a statement returning patient ids.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CompileError` if the panel cannot be expressed.
    fn compile_panel(&self, panel: &Panel) -> Result<CompiledStatement, StorageError>;

    /// Compiles a whole query into one statement returning the final cohort.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CompileError` if the query cannot be expressed.
    fn compile_query(&self, query: &PatientCountQuery) -> Result<CompiledStatement, StorageError>;
}

/// Executes compiled statements against a data backend.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Starts executing `statement`, streaming patient ids as they arrive.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement could not be started. Failures while
    /// reading are yielded through the stream.
    async fn execute(&self, statement: &CompiledStatement) -> Result<PatientIdStream, StorageError>;
}

/// Persists final cohorts as unsaved queries for later reference.
#[async_trait]
pub trait CohortCache: Send + Sync {
    /// Stores `cohort` on behalf of `user` and returns the generated query id.
    ///
    /// # Errors
    ///
    /// Returns an error if the cohort could not be stored.
    async fn create_unsaved_query(
        &self,
        cohort: &PatientCohort,
        user: &UserContext,
    ) -> Result<Uuid, StorageError>;
}
