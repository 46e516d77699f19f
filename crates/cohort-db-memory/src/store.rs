use std::collections::HashSet;

use cohort_config::CompilerOptions;
use cohort_core::{Concept, GlobalPanelFilter, PatientCohort, Urn, UserContext};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::compiler::PendingPlan;

/// Who may use a catalog entry. Both lists empty means everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Access {
    pub users: Vec<String>,
    pub groups: Vec<String>,
}

impl Access {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
            groups: Vec::new(),
        }
    }

    pub fn groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: Vec::new(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, user: &UserContext) -> bool {
        user.is_admin
            || (self.users.is_empty() && self.groups.is_empty())
            || self.users.contains(&user.username)
            || self.groups.iter().any(|g| user.is_in_group(g))
    }
}

/// A concept together with its access rule and the patients it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConcept {
    #[serde(flatten)]
    pub concept: Concept,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub patients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub id: Uuid,
    #[serde(default)]
    pub universal_id: Option<Urn>,
    #[serde(default = "first_version")]
    pub version: i32,
    pub owner: String,
    #[serde(default)]
    pub shared: bool,
    /// Concepts the saved definition depends on.
    #[serde(default)]
    pub concepts: Vec<Uuid>,
    #[serde(default)]
    pub patients: Vec<String>,
}

fn first_version() -> i32 {
    1
}

impl SavedQuery {
    pub fn allows(&self, user: &UserContext) -> bool {
        user.is_admin || self.shared || self.owner == user.username
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub person_id: String,
    #[serde(default)]
    pub value_number: Option<i32>,
    #[serde(default)]
    pub source_modifier: Option<String>,
}

/// An uploaded dataset addressable through import URNs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDataset {
    pub id: Uuid,
    pub universal_id: Urn,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub rows: Vec<ImportRow>,
}

impl ImportDataset {
    /// Whether an import URN base segment addresses this dataset.
    pub fn covers(&self, base_segment: &str) -> bool {
        base_segment
            .strip_prefix(self.universal_id.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
    }

    /// Patients matching an import URN's value and modifier arguments.
    pub fn patients_for(&self, urn: &Urn) -> HashSet<String> {
        let Some(args) = urn.import_args() else {
            return HashSet::new();
        };
        if !self.covers(&args.base_segment) {
            return HashSet::new();
        }
        self.rows
            .iter()
            .filter(|row| args.value.is_none_or(|v| row.value_number == Some(v)))
            .filter(|row| args.modifier.is_none() || row.source_modifier == args.modifier)
            .map(|row| row.person_id.clone())
            .collect()
    }
}

/// A cohort stored by the cache on behalf of a user.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedCohort {
    pub id: Uuid,
    pub owner: String,
    pub cohort: PatientCohort,
    pub created_at: OffsetDateTime,
}

/// Serializable contents of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSnapshot {
    pub concepts: Vec<CatalogConcept>,
    pub queries: Vec<SavedQuery>,
    pub imports: Vec<ImportDataset>,
    pub global_filters: Vec<GlobalFilterEntry>,
}

/// A global filter and the patients it selects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalFilterEntry {
    #[serde(flatten)]
    pub filter: GlobalPanelFilter,
    #[serde(default)]
    pub patients: Vec<String>,
}

/// In-memory catalog, patient index and cohort cache.
///
/// One store implements every collaborator trait, so compiled statements can
/// be evaluated against the same data the preflight check saw.
#[derive(Debug)]
pub struct InMemoryStore {
    pub(crate) concepts: DashMap<Uuid, CatalogConcept>,
    pub(crate) queries: DashMap<Uuid, SavedQuery>,
    pub(crate) imports: DashMap<Uuid, ImportDataset>,
    pub(crate) global_filters: DashMap<Uuid, GlobalPanelFilter>,
    /// Patient ids per concept id, global filters included.
    pub(crate) facts: DashMap<Uuid, HashSet<String>>,
    pub(crate) cohorts: DashMap<Uuid, CachedCohort>,
    /// Compiled statements awaiting execution, by SQL text.
    pub(crate) plans: DashMap<String, PendingPlan>,
    pub(crate) options: CompilerOptions,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

impl InMemoryStore {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            concepts: DashMap::new(),
            queries: DashMap::new(),
            imports: DashMap::new(),
            global_filters: DashMap::new(),
            facts: DashMap::new(),
            cohorts: DashMap::new(),
            plans: DashMap::new(),
            options,
        }
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot, options: CompilerOptions) -> Self {
        let store = Self::new(options);
        for entry in snapshot.concepts {
            store.insert_concept(entry);
        }
        for query in snapshot.queries {
            store.insert_query(query);
        }
        for dataset in snapshot.imports {
            store.insert_import(dataset);
        }
        for entry in snapshot.global_filters {
            store.insert_global_filter(entry.filter, entry.patients);
        }
        tracing::debug!(
            concepts = store.concepts.len(),
            queries = store.queries.len(),
            imports = store.imports.len(),
            global_filters = store.global_filters.len(),
            "in-memory catalog loaded"
        );
        store
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn insert_concept(&self, entry: CatalogConcept) {
        let id = entry.concept.id;
        self.facts.insert(id, entry.patients.iter().cloned().collect());
        self.concepts.insert(id, entry);
    }

    pub fn insert_query(&self, query: SavedQuery) {
        self.facts.insert(query.id, query.patients.iter().cloned().collect());
        self.queries.insert(query.id, query);
    }

    pub fn insert_import(&self, dataset: ImportDataset) {
        self.imports.insert(dataset.id, dataset);
    }

    pub fn insert_global_filter(&self, filter: GlobalPanelFilter, patients: Vec<String>) {
        self.facts.insert(filter.id, patients.into_iter().collect());
        self.global_filters.insert(filter.id, filter);
    }

    pub fn cached_cohort(&self, id: &Uuid) -> Option<CachedCohort> {
        self.cohorts.get(id).map(|entry| entry.value().clone())
    }

    pub fn cached_count(&self) -> usize {
        self.cohorts.len()
    }

    /// Patients matched by a resolved concept.
    ///
    /// Import concepts are evaluated against their dataset rows; everything
    /// else is looked up by concept id, then among cached cohorts.
    pub(crate) fn patients_for(&self, concept: &Concept) -> HashSet<String> {
        if let Some(urn) = concept.universal_id.as_ref().filter(|u| u.import_args().is_some()) {
            return self
                .imports
                .iter()
                .flat_map(|dataset| dataset.patients_for(urn))
                .collect();
        }
        if let Some(ids) = self.facts.get(&concept.id) {
            return ids.value().clone();
        }
        self.cohorts
            .get(&concept.id)
            .map(|cached| cached.cohort.patient_ids.clone())
            .unwrap_or_default()
    }
}
