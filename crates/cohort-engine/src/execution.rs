//! Running compiled statements against a [`QueryExecutor`].
//!
//! Each statement yields one [`PartialPatientCountContext`]. Results are
//! owned by the caller once returned and are never shared between tasks.

use std::collections::HashSet;
use std::sync::Arc;

use cohort_core::PartialPatientCountContext;
use cohort_storage::{CompiledStatement, DynQueryExecutor, QueryExecutor, StorageError};
use futures_util::TryStreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{CohortError, Result};

/// Executes one statement and drains its id stream.
pub(crate) async fn collect_patient_ids(
    executor: &dyn QueryExecutor,
    statement: &CompiledStatement,
) -> std::result::Result<HashSet<String>, StorageError> {
    let stream = executor.execute(statement).await?;
    stream.try_collect::<HashSet<String>>().await
}

async fn run_statement(
    executor: &dyn QueryExecutor,
    statement: &CompiledStatement,
) -> std::result::Result<PartialPatientCountContext, StorageError> {
    let patient_ids = collect_patient_ids(executor, statement).await?;
    tracing::debug!(
        panel = ?statement.panel_index,
        inclusion = statement.is_inclusion,
        patients = patient_ids.len(),
        "Partial query finished"
    );
    Ok(PartialPatientCountContext {
        patient_ids,
        is_inclusion_criteria: statement.is_inclusion,
    })
}

/// Runs statements one after another, stopping at the first failure.
pub(crate) async fn run_sequential(
    executor: &DynQueryExecutor,
    statements: &[CompiledStatement],
) -> Result<Vec<PartialPatientCountContext>> {
    let mut partials = Vec::with_capacity(statements.len());
    for statement in statements {
        let partial = run_statement(executor.as_ref(), statement)
            .await
            .map_err(CohortError::execution_failed)?;
        partials.push(partial);
    }
    Ok(partials)
}

/// Runs statements concurrently with at most `max_parallelism` in flight.
///
/// On the first failure the remaining tasks are aborted and every result
/// collected so far is dropped.
pub(crate) async fn run_parallel(
    executor: &DynQueryExecutor,
    statements: &[CompiledStatement],
    max_parallelism: usize,
) -> Result<Vec<PartialPatientCountContext>> {
    let semaphore = Arc::new(Semaphore::new(max_parallelism.max(1)));
    let mut join_set = JoinSet::new();

    for statement in statements.iter().cloned() {
        let executor = Arc::clone(executor);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| StorageError::internal(format!("worker pool closed: {e}")))?;
            run_statement(executor.as_ref(), &statement).await
        });
    }

    let mut partials = Vec::with_capacity(statements.len());
    while let Some(joined) = join_set.join_next().await {
        let outcome = joined
            .map_err(|e| StorageError::internal(format!("partial query task failed: {e}")))
            .and_then(|result| result);
        match outcome {
            Ok(partial) => partials.push(partial),
            Err(e) => {
                tracing::warn!(error = %e, "Partial query failed, discarding sibling results");
                join_set.abort_all();
                return Err(CohortError::execution_failed(e));
            }
        }
    }
    Ok(partials)
}
