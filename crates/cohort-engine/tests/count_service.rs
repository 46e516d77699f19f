use std::sync::Arc;

use async_trait::async_trait;
use cohort_config::{AppConfig, CompilerOptions, ExecutionStrategy};
use cohort_core::{Concept, GlobalPanelFilter, QueryDefinition, UserContext};
use cohort_db_memory::{Access, CatalogConcept, CatalogSnapshot, SharedStore, create_store};
use cohort_engine::{CancellationToken, CohortCountOutcome, CohortError, CohortPlanOutcome, PatientCountService};
use cohort_privacy::PrivacyError;
use cohort_storage::{CompiledStatement, PatientIdStream, QueryExecutor, StorageError};
use serde_json::json;
use uuid::Uuid;

struct Fixture {
    store: SharedStore,
    diabetes: Uuid,
    insulin: Uuid,
    restricted: Uuid,
}

fn fixture() -> Fixture {
    let diabetes = Uuid::new_v4();
    let insulin = Uuid::new_v4();
    let restricted = Uuid::new_v4();
    let entry = |id: Uuid, sql: &str, access: Access, patients: &[&str]| CatalogConcept {
        concept: Concept::new(id, sql)
            .with_universal_id(format!("urn:leaf:concept:test:{id}").parse().unwrap()),
        access,
        patients: patients.iter().map(|p| p.to_string()).collect(),
    };
    let snapshot = CatalogSnapshot {
        concepts: vec![
            entry(diabetes, "dbo.Diagnosis", Access::open(), &["1", "2", "3", "4", "5"]),
            entry(insulin, "dbo.Medication", Access::open(), &["2", "4", "6"]),
            entry(restricted, "dbo.Genomics", Access::groups(["genomics"]), &["1"]),
        ],
        ..Default::default()
    };
    Fixture {
        store: create_store(snapshot, CompilerOptions::default()),
        diabetes,
        insulin,
        restricted,
    }
}

fn service(store: &SharedStore, strategy: ExecutionStrategy) -> PatientCountService {
    let mut config = AppConfig::default();
    config.cohort.strategy = strategy;
    config.deidentification.cohort.enabled = false;
    PatientCountService::from_config(&config, store.clone(), store.clone(), store.clone(), store.clone()).unwrap()
}

/// Fires the caller's token while a statement is running, then lets it finish.
struct CancellingExecutor {
    store: SharedStore,
    token: CancellationToken,
}

#[async_trait]
impl QueryExecutor for CancellingExecutor {
    async fn execute(&self, statement: &CompiledStatement) -> Result<PatientIdStream, StorageError> {
        self.token.cancel();
        self.store.execute(statement).await
    }
}

/// One single-item panel per `(concept, include)` pair.
fn definition(panels: &[(Uuid, bool)]) -> QueryDefinition {
    let panels: Vec<_> = panels
        .iter()
        .enumerate()
        .map(|(i, (id, include))| {
            json!({
                "index": i,
                "includePanel": include,
                "subPanels": [{ "index": 0, "panelItems": [{ "index": 0, "resource": { "id": id } }] }]
            })
        })
        .collect();
    serde_json::from_value(json!({ "panels": panels })).unwrap()
}

fn counted(outcome: CohortCountOutcome) -> u64 {
    match outcome {
        CohortCountOutcome::Counted(response) => response.count.value,
        CohortCountOutcome::PreflightFailed(errors) => panic!("unexpected preflight failure: {errors:?}"),
    }
}

#[tokio::test]
async fn count_intersects_inclusions_and_caches_the_cohort() {
    let f = fixture();
    let svc = service(&f.store, ExecutionStrategy::Parallel);
    let user = UserContext::institutional("alice");

    let outcome = svc
        .count(&definition(&[(f.diabetes, true), (f.insulin, true)]), &user, &CancellationToken::new())
        .await
        .unwrap();
    let CohortCountOutcome::Counted(response) = outcome else {
        panic!("expected a count");
    };

    assert_eq!(response.count.value, 2);
    assert_eq!(response.sql_statements.len(), 2);
    assert!(response.sql_statements[0].starts_with("/*  - Included */"));

    let cached = f.store.cached_cohort(&response.query_id).unwrap();
    assert_eq!(cached.owner, "alice");
    assert_eq!(cached.cohort.sorted_ids(), vec!["2", "4"]);
}

#[tokio::test]
async fn exclusion_panel_removes_patients() {
    let f = fixture();
    let svc = service(&f.store, ExecutionStrategy::Sequential);
    let def = definition(&[(f.diabetes, true), (f.insulin, false)]);

    let count = counted(
        svc.count(&def, &UserContext::institutional("alice"), &CancellationToken::new())
            .await
            .unwrap(),
    );
    assert_eq!(count, 3);
}

#[tokio::test]
async fn strategies_agree() {
    let f = fixture();
    let def = definition(&[(f.diabetes, true), (f.insulin, false)]);
    let user = UserContext::institutional("alice");

    let mut counts = Vec::new();
    for strategy in [
        ExecutionStrategy::Sequential,
        ExecutionStrategy::Parallel,
        ExecutionStrategy::Combined,
    ] {
        let svc = service(&f.store, strategy);
        counts.push(counted(svc.count(&def, &user, &CancellationToken::new()).await.unwrap()));
    }
    assert_eq!(counts, vec![3, 3, 3]);
}

#[tokio::test]
async fn unauthorized_concept_fails_preflight_without_running() {
    let f = fixture();
    let svc = service(&f.store, ExecutionStrategy::Parallel);
    let def = definition(&[(f.diabetes, true), (f.restricted, true)]);

    let outcome = svc
        .count(&def, &UserContext::institutional("alice"), &CancellationToken::new())
        .await
        .unwrap();
    let CohortCountOutcome::PreflightFailed(errors) = outcome else {
        panic!("expected preflight failure");
    };
    assert_eq!(errors.concept_errors.len(), 1);
    assert!(!errors.concept_errors[0].is_authorized);
    assert_eq!(f.store.cached_count(), 0);

    let member = UserContext::institutional("bob").with_groups(["genomics"]);
    assert_eq!(
        counted(svc.count(&def, &member, &CancellationToken::new()).await.unwrap()),
        1
    );
}

#[tokio::test]
async fn cancelled_request_caches_nothing() {
    let f = fixture();
    let svc = service(&f.store, ExecutionStrategy::Parallel);
    let token = CancellationToken::new();
    token.cancel();

    let err = svc
        .count(&definition(&[(f.diabetes, true)]), &UserContext::institutional("alice"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, CohortError::Cancelled));
    assert!(err.is_cancelled());
    assert_eq!(f.store.cached_count(), 0);
}

#[tokio::test]
async fn cancellation_during_execution_discards_results() {
    for strategy in [
        ExecutionStrategy::Sequential,
        ExecutionStrategy::Parallel,
        ExecutionStrategy::Combined,
    ] {
        let f = fixture();
        let token = CancellationToken::new();
        let mut config = AppConfig::default();
        config.cohort.strategy = strategy;
        let executor = Arc::new(CancellingExecutor {
            store: f.store.clone(),
            token: token.clone(),
        });
        let svc = PatientCountService::from_config(&config, f.store.clone(), f.store.clone(), executor, f.store.clone())
            .unwrap();

        let err = svc
            .count(
                &definition(&[(f.diabetes, true), (f.insulin, false)]),
                &UserContext::institutional("alice"),
                &token,
            )
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "{strategy:?} returned {err}");
        assert_eq!(f.store.cached_count(), 0, "{strategy:?} cached a cancelled cohort");
        assert_eq!(f.store.pending_statements(), 0, "{strategy:?} left statements unexecuted");
    }
}

#[tokio::test]
async fn enabled_obfuscation_without_shift_is_refused() {
    let f = fixture();
    let mut config = AppConfig::default();
    config.deidentification.cohort.shift = 0;

    let err = PatientCountService::from_config(&config, f.store.clone(), f.store.clone(), f.store.clone(), f.store.clone())
        .err()
        .unwrap();
    assert!(matches!(err, CohortError::Privacy(PrivacyError::ZeroObfuscationShift)));
}

#[tokio::test]
async fn panel_filter_past_the_last_index_is_rejected() {
    let f = fixture();
    let svc = service(&f.store, ExecutionStrategy::Parallel);
    let def: QueryDefinition = serde_json::from_value(json!({
        "panels": [{ "index": i32::MAX, "subPanels": [{ "index": 0, "panelItems": [
            { "index": 0, "resource": { "id": f.diabetes } }
        ]}]}],
        "panelFilters": [{ "concept": { "id": f.insulin }, "isInclusion": true }]
    }))
    .unwrap();

    let err = svc.plan(&def, &UserContext::institutional("alice")).await.err().unwrap();
    assert!(matches!(err, CohortError::Compiler(_)));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn global_exclusion_filter_applies_to_every_query() {
    let f = fixture();
    f.store.insert_global_filter(
        GlobalPanelFilter {
            id: Uuid::new_v4(),
            is_inclusion: false,
            sql_set_from: "dbo.OptOut".into(),
            sql_set_where: None,
            description: Some("Research opt-out".into()),
        },
        vec!["1".into(), "2".into()],
    );
    let svc = service(&f.store, ExecutionStrategy::Parallel);

    let outcome = svc
        .count(&definition(&[(f.diabetes, true)]), &UserContext::institutional("alice"), &CancellationToken::new())
        .await
        .unwrap();
    let CohortCountOutcome::Counted(response) = outcome else {
        panic!("expected a count");
    };
    assert_eq!(response.count.value, 3);
    assert!(response.sql_statements.iter().any(|s| s.starts_with("/* GlobalPanelFilter - Excluded */")));
}

#[tokio::test]
async fn small_counts_are_suppressed_when_obfuscating() {
    let f = fixture();
    let svc = PatientCountService::from_config(
        &AppConfig::default(),
        f.store.clone(),
        f.store.clone(),
        f.store.clone(),
        f.store.clone(),
    )
    .unwrap();

    let outcome = svc
        .count(&definition(&[(f.insulin, true)]), &UserContext::institutional("alice"), &CancellationToken::new())
        .await
        .unwrap();
    let CohortCountOutcome::Counted(response) = outcome else {
        panic!("expected a count");
    };
    assert!(response.count.under_threshold);
    assert_eq!(response.count.value, 10);
}

#[tokio::test]
async fn federated_plan_localizes_references() {
    let f = fixture();
    let svc = service(&f.store, ExecutionStrategy::Parallel);
    let urn = format!("urn:leaf:concept:test:{}", f.diabetes);
    let def: QueryDefinition = serde_json::from_value(json!({
        "panels": [{ "index": 0, "subPanels": [{ "index": 0, "panelItems": [
            { "index": 0, "resource": { "universalId": urn } }
        ]}]}]
    }))
    .unwrap();

    let outcome = svc.plan(&def, &UserContext::federated("peer")).await.unwrap();
    let CohortPlanOutcome::Planned { query, definition } = outcome else {
        panic!("expected a plan");
    };
    assert_eq!(query.panels.len(), 1);
    assert_eq!(definition.panels[0].sub_panels[0].panel_items[0].resource.id(), Some(f.diabetes));
}
