use async_trait::async_trait;
use cohort_storage::{CompiledStatement, PatientIdStream, QueryExecutor, StorageError};
use futures_util::stream;

use crate::store::InMemoryStore;

#[async_trait]
impl QueryExecutor for InMemoryStore {
    async fn execute(&self, statement: &CompiledStatement) -> Result<PatientIdStream, StorageError> {
        let plan = self
            .take_plan(&statement.sql)
            .ok_or_else(|| StorageError::query_error("statement was not compiled by this store"))?;

        let mut ids: Vec<String> = plan.evaluate(self).into_iter().collect();
        ids.sort_unstable();
        tracing::trace!(panel = ?statement.panel_index, rows = ids.len(), "in-memory statement evaluated");
        Ok(Box::pin(stream::iter(ids.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use cohort_core::{Concept, Panel};
    use cohort_storage::PanelCompiler;
    use futures_util::TryStreamExt;
    use uuid::Uuid;

    use super::*;
    use crate::store::{Access, CatalogConcept};

    #[tokio::test]
    async fn test_execute_streams_sorted_ids() {
        let store = InMemoryStore::default();
        let concept = Concept::new(Uuid::new_v4(), "dbo.Diagnosis");
        store.insert_concept(CatalogConcept {
            concept: concept.clone(),
            access: Access::open(),
            patients: vec!["3".into(), "1".into(), "2".into()],
        });

        let stmt = store.compile_panel(&Panel::for_concept(0, concept, true)).unwrap();
        let ids: Vec<String> = store.execute(&stmt).await.unwrap().try_collect().await.unwrap();
        assert_eq!(ids, vec!["1", "2", "3"]);

        // Each compile pays for exactly one execution.
        assert_eq!(store.pending_statements(), 0);
        assert!(store.execute(&stmt).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_statement_rejected() {
        let store = InMemoryStore::default();
        let err = store
            .execute(&CompiledStatement::for_query("SELECT 1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::QueryError { .. }));
    }
}
