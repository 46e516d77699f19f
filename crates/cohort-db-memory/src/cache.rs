use async_trait::async_trait;
use cohort_core::{PatientCohort, UserContext};
use cohort_storage::{CohortCache, StorageError};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::{CachedCohort, InMemoryStore};

#[async_trait]
impl CohortCache for InMemoryStore {
    async fn create_unsaved_query(&self, cohort: &PatientCohort, user: &UserContext) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        self.cohorts.insert(
            id,
            CachedCohort {
                id,
                owner: user.username.clone(),
                cohort: PatientCohort {
                    query_id: Some(id),
                    ..cohort.clone()
                },
                created_at: OffsetDateTime::now_utc(),
            },
        );
        tracing::debug!(query_id = %id, owner = %user.username, patients = cohort.count(), "cohort cached");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cached_cohort_is_retrievable() {
        let store = InMemoryStore::default();
        let cohort = PatientCohort {
            query_id: None,
            patient_ids: ["1", "2"].map(String::from).into(),
            sql_statements: vec!["SELECT 1".into()],
        };

        let id = store
            .create_unsaved_query(&cohort, &UserContext::institutional("alice"))
            .await
            .unwrap();
        let cached = store.cached_cohort(&id).unwrap();
        assert_eq!(cached.owner, "alice");
        assert_eq!(cached.cohort.query_id, Some(id));
        assert_eq!(cached.cohort.patient_ids, cohort.patient_ids);
        assert_eq!(store.cached_count(), 1);
    }
}
