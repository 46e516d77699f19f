use async_trait::async_trait;
use cohort_core::{
    CallerMode, ConceptPreflightCheck, ConceptPreflightCheckResult, GlobalPanelFilter, ImportPreflightCheck,
    ImportPreflightCheckResult, PreflightResources, QueryPreflightCheck, QueryPreflightCheckResult, ResourceRef,
    ResourceRefs, UserContext,
};
use cohort_storage::{PreflightResourceReader, StorageError};

use crate::store::{CatalogConcept, ImportDataset, InMemoryStore, SavedQuery};

impl InMemoryStore {
    fn find_concept(&self, reference: &ResourceRef, mode: CallerMode) -> Option<CatalogConcept> {
        match (reference, mode) {
            (ResourceRef::Id(id), CallerMode::Institutional) => self.concepts.get(id).map(|e| e.value().clone()),
            (ResourceRef::UniversalId(urn), CallerMode::Federated) => self
                .concepts
                .iter()
                .find(|e| e.concept.universal_id.as_ref() == Some(urn))
                .map(|e| e.value().clone()),
            _ => None,
        }
    }

    fn find_query(&self, reference: &ResourceRef, mode: CallerMode) -> Option<SavedQuery> {
        match (reference, mode) {
            (ResourceRef::Id(id), CallerMode::Institutional) => self.queries.get(id).map(|e| e.value().clone()),
            (ResourceRef::UniversalId(urn), CallerMode::Federated) => self
                .queries
                .iter()
                .find(|e| e.universal_id.as_ref() == Some(urn))
                .map(|e| e.value().clone()),
            _ => None,
        }
    }

    fn find_import(&self, reference: &ResourceRef, mode: CallerMode) -> Option<ImportDataset> {
        match (reference, mode) {
            (ResourceRef::Id(id), CallerMode::Institutional) => self.imports.get(id).map(|e| e.value().clone()),
            (ResourceRef::UniversalId(urn), CallerMode::Federated) => {
                let base = urn.import_args()?.base_segment;
                self.imports
                    .iter()
                    .find(|e| e.covers(&base))
                    .map(|e| e.value().clone())
            }
            _ => None,
        }
    }

    fn check_concept(&self, reference: &ResourceRef, found: Option<CatalogConcept>, user: &UserContext) -> ConceptPreflightCheckResult {
        match found {
            Some(entry) if entry.access.allows(user) => {
                ConceptPreflightCheckResult::present(reference.clone(), entry.concept)
            }
            Some(_) => ConceptPreflightCheckResult::unauthorized(reference.clone()),
            None => ConceptPreflightCheckResult::missing(reference.clone()),
        }
    }

    fn check_query(&self, reference: &ResourceRef, user: &UserContext) -> QueryPreflightCheckResult {
        let Some(query) = self.find_query(reference, user.mode) else {
            return QueryPreflightCheckResult::missing(reference.clone());
        };
        // Dependencies are stored by local id whatever the caller's mode.
        let concept_check = ConceptPreflightCheck {
            results: query
                .concepts
                .iter()
                .map(|id| {
                    let dependency = ResourceRef::Id(*id);
                    let found = self.concepts.get(id).map(|e| e.value().clone());
                    self.check_concept(&dependency, found, user)
                })
                .collect(),
        };
        QueryPreflightCheckResult {
            reference: reference.clone(),
            query_id: Some(query.id),
            universal_id: query.universal_id.clone(),
            version: query.version,
            is_present: true,
            is_authorized: query.allows(user),
            concept_check,
        }
    }

    fn check_import(&self, reference: &ResourceRef, user: &UserContext) -> ImportPreflightCheckResult {
        let Some(dataset) = self.find_import(reference, user.mode) else {
            return ImportPreflightCheckResult::missing(reference.clone());
        };
        let universal_id = match reference {
            ResourceRef::UniversalId(urn) => urn.clone(),
            ResourceRef::Id(_) => dataset.universal_id.clone(),
        };
        ImportPreflightCheckResult {
            reference: reference.clone(),
            import_id: Some(dataset.id),
            universal_id: Some(universal_id),
            is_present: true,
            is_authorized: dataset.access.allows(user),
        }
    }

    fn sorted_global_filters(&self) -> Vec<GlobalPanelFilter> {
        let mut filters: Vec<_> = self.global_filters.iter().map(|e| e.value().clone()).collect();
        filters.sort_by_key(|f| f.id);
        filters
    }
}

#[async_trait]
impl PreflightResourceReader for InMemoryStore {
    async fn check(&self, refs: &ResourceRefs, user: &UserContext) -> Result<PreflightResources, StorageError> {
        let concepts = refs
            .concepts
            .iter()
            .map(|r| self.check_concept(r, self.find_concept(r, user.mode), user))
            .collect();
        let queries = refs.queries.iter().map(|r| self.check_query(r, user)).collect();
        let imports = refs.imports.iter().map(|r| self.check_import(r, user)).collect();

        Ok(PreflightResources {
            concepts: ConceptPreflightCheck { results: concepts },
            queries: QueryPreflightCheck { results: queries },
            imports: ImportPreflightCheck { results: imports },
            global_panel_filters: self.sorted_global_filters(),
        })
    }
}

#[cfg(test)]
mod tests {
    use cohort_core::{Concept, ResourceKind, Urn};
    use uuid::Uuid;

    use super::*;
    use crate::store::Access;

    fn store() -> (InMemoryStore, Uuid, Uuid) {
        let store = InMemoryStore::default();
        let open = Uuid::new_v4();
        let restricted = Uuid::new_v4();
        store.insert_concept(CatalogConcept {
            concept: Concept::new(open, "dbo.Diagnosis")
                .with_universal_id("urn:leaf:concept:diag:open".parse().unwrap()),
            access: Access::open(),
            patients: vec!["1".into()],
        });
        store.insert_concept(CatalogConcept {
            concept: Concept::new(restricted, "dbo.Lab"),
            access: Access::users(["bob"]),
            patients: vec![],
        });
        (store, open, restricted)
    }

    fn refs(items: &[(ResourceKind, ResourceRef)]) -> ResourceRefs {
        let mut refs = ResourceRefs::new();
        for (kind, r) in items {
            refs.insert(*kind, r.clone());
        }
        refs
    }

    #[tokio::test]
    async fn test_concepts_checked_per_user() {
        let (store, open, restricted) = store();
        let refs = refs(&[
            (ResourceKind::Concept, ResourceRef::Id(open)),
            (ResourceKind::Concept, ResourceRef::Id(restricted)),
        ]);

        let alice = store.check(&refs, &UserContext::institutional("alice")).await.unwrap();
        assert!(!alice.ok());
        assert_eq!(alice.errors().concept_errors[0].reference, ResourceRef::Id(restricted));

        let bob = store.check(&refs, &UserContext::institutional("bob")).await.unwrap();
        assert!(bob.ok());
    }

    #[tokio::test]
    async fn test_federated_lookup_by_universal_id() {
        let (store, open, _) = store();
        let peer = UserContext::federated("peer");
        let urn: Urn = "urn:leaf:concept:diag:open".parse().unwrap();

        let by_urn = store
            .check(&refs(&[(ResourceKind::Concept, ResourceRef::UniversalId(urn))]), &peer)
            .await
            .unwrap();
        assert!(by_urn.ok());
        assert_eq!(by_urn.concepts.concepts().next().map(|c| c.id), Some(open));

        let by_id = store
            .check(&refs(&[(ResourceKind::Concept, ResourceRef::Id(open))]), &peer)
            .await
            .unwrap();
        assert!(!by_id.ok());
    }

    #[tokio::test]
    async fn test_saved_query_checks_owner_and_dependencies() {
        let (store, open, restricted) = store();
        let query = Uuid::new_v4();
        store.insert_query(SavedQuery {
            id: query,
            universal_id: Some(Urn::for_query(query, 1)),
            version: 1,
            owner: "alice".into(),
            shared: false,
            concepts: vec![open, restricted],
            patients: vec!["1".into()],
        });
        let refs = refs(&[(ResourceKind::Query, ResourceRef::Id(query))]);

        let alice = store.check(&refs, &UserContext::institutional("alice")).await.unwrap();
        let result = &alice.queries.results[0];
        assert!(result.is_authorized);
        assert!(!result.ok(), "restricted dependency must fail the check");

        let bob = store.check(&refs, &UserContext::institutional("bob")).await.unwrap();
        assert!(!bob.queries.results[0].is_authorized);
    }
}
