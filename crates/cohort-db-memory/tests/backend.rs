use cohort_config::CompilerOptions;
use cohort_core::{Concept, Panel, ResourceKind, ResourceRef, ResourceRefs, Urn, UserContext};
use cohort_db_memory::{CatalogSnapshot, create_store};
use cohort_storage::{PanelCompiler, PreflightResourceReader, QueryExecutor};
use futures_util::TryStreamExt;
use serde_json::json;
use uuid::Uuid;

const DATASET: &str = "6f1a3c4e-2b7d-4a10-9c55-0e8f7b2d1a33";

fn snapshot() -> CatalogSnapshot {
    serde_json::from_value(json!({
        "imports": [{
            "id": DATASET,
            "universalId": "urn:leaf:import:redcap:42",
            "access": { "users": ["alice"] },
            "rows": [
                { "personId": "p1", "valueNumber": 1 },
                { "personId": "p2", "valueNumber": 1, "sourceModifier": "followup" },
                { "personId": "p3", "valueNumber": 2 }
            ]
        }]
    }))
    .unwrap()
}

fn import_refs(reference: ResourceRef) -> ResourceRefs {
    let mut refs = ResourceRefs::new();
    refs.insert(ResourceKind::Import, reference);
    refs
}

#[tokio::test]
async fn import_preflight_by_id_and_urn() {
    let store = create_store(snapshot(), CompilerOptions::default());
    let dataset: Uuid = DATASET.parse().unwrap();

    let by_id = store
        .check(&import_refs(ResourceRef::Id(dataset)), &UserContext::institutional("alice"))
        .await
        .unwrap();
    assert!(by_id.ok());
    assert_eq!(by_id.imports.results[0].import_id, Some(dataset));

    let urn: Urn = "urn:leaf:import:redcap:42:val=1".parse().unwrap();
    let by_urn = store
        .check(
            &import_refs(ResourceRef::UniversalId(urn.clone())),
            &UserContext::federated("alice"),
        )
        .await
        .unwrap();
    assert!(by_urn.ok());
    assert_eq!(by_urn.imports.results[0].universal_id, Some(urn));

    let stranger = store
        .check(&import_refs(ResourceRef::Id(dataset)), &UserContext::institutional("mallory"))
        .await
        .unwrap();
    assert!(!stranger.ok());
    assert!(stranger.imports.results[0].is_present);
}

#[tokio::test]
async fn import_concept_evaluates_against_dataset_rows() {
    let store = create_store(snapshot(), CompilerOptions::default());
    let urn: Urn = "urn:leaf:import:redcap:42:val=1".parse().unwrap();
    let concept = Concept::new(Uuid::new_v5(&Uuid::NAMESPACE_URL, urn.as_str().as_bytes()), "app.Import")
        .with_universal_id(urn);

    let stmt = store.compile_panel(&Panel::for_concept(0, concept, true)).unwrap();
    let ids: Vec<String> = store.execute(&stmt).await.unwrap().try_collect().await.unwrap();
    assert_eq!(ids, vec!["p1", "p2"]);
}
