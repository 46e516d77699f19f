//! Results of the authorization/presence check performed before hydration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::concept::Concept;
use crate::reference::ResourceRef;
use crate::urn::Urn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptPreflightCheckResult {
    pub reference: ResourceRef,
    pub is_present: bool,
    pub is_authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept: Option<Concept>,
}

impl ConceptPreflightCheckResult {
    pub fn ok(&self) -> bool {
        self.is_present && self.is_authorized
    }

    pub fn present(reference: ResourceRef, concept: Concept) -> Self {
        Self {
            reference,
            is_present: true,
            is_authorized: true,
            concept: Some(concept),
        }
    }

    pub fn missing(reference: ResourceRef) -> Self {
        Self {
            reference,
            is_present: false,
            is_authorized: false,
            concept: None,
        }
    }

    pub fn unauthorized(reference: ResourceRef) -> Self {
        Self {
            reference,
            is_present: true,
            is_authorized: false,
            concept: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptPreflightCheck {
    pub results: Vec<ConceptPreflightCheckResult>,
}

impl ConceptPreflightCheck {
    pub fn ok(&self) -> bool {
        self.results.iter().all(ConceptPreflightCheckResult::ok)
    }

    /// Resolved concepts of passing results.
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.results
            .iter()
            .filter(|r| r.ok())
            .filter_map(|r| r.concept.as_ref())
    }

    /// Failing results with any resolved concept stripped.
    pub fn errors(&self) -> Vec<ConceptPreflightCheckResult> {
        self.results
            .iter()
            .filter(|r| !r.ok())
            .map(|r| ConceptPreflightCheckResult {
                concept: None,
                ..r.clone()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPreflightCheckResult {
    pub reference: ResourceRef,
    /// Local id of the saved query, when present.
    pub query_id: Option<Uuid>,
    pub universal_id: Option<Urn>,
    pub version: i32,
    pub is_present: bool,
    pub is_authorized: bool,
    /// Check of every concept the saved query itself depends on.
    pub concept_check: ConceptPreflightCheck,
}

impl QueryPreflightCheckResult {
    pub fn ok(&self) -> bool {
        self.is_present && self.is_authorized && self.concept_check.ok()
    }

    pub fn missing(reference: ResourceRef) -> Self {
        Self {
            reference,
            query_id: None,
            universal_id: None,
            version: 0,
            is_present: false,
            is_authorized: false,
            concept_check: ConceptPreflightCheck::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPreflightCheck {
    pub results: Vec<QueryPreflightCheckResult>,
}

impl QueryPreflightCheck {
    pub fn ok(&self) -> bool {
        self.results.iter().all(QueryPreflightCheckResult::ok)
    }

    pub fn errors(&self) -> Vec<QueryPreflightCheckResult> {
        self.results
            .iter()
            .filter(|r| !r.ok())
            .map(|r| QueryPreflightCheckResult {
                concept_check: ConceptPreflightCheck {
                    results: r.concept_check.errors(),
                },
                ..r.clone()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreflightCheckResult {
    pub reference: ResourceRef,
    /// Local id of the import's metadata record.
    pub import_id: Option<Uuid>,
    pub universal_id: Option<Urn>,
    pub is_present: bool,
    pub is_authorized: bool,
}

impl ImportPreflightCheckResult {
    pub fn ok(&self) -> bool {
        self.is_present && self.is_authorized
    }

    pub fn missing(reference: ResourceRef) -> Self {
        Self {
            reference,
            import_id: None,
            universal_id: None,
            is_present: false,
            is_authorized: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreflightCheck {
    pub results: Vec<ImportPreflightCheckResult>,
}

impl ImportPreflightCheck {
    pub fn ok(&self) -> bool {
        self.results.iter().all(ImportPreflightCheckResult::ok)
    }

    pub fn errors(&self) -> Vec<ImportPreflightCheckResult> {
        self.results.iter().filter(|r| !r.ok()).cloned().collect()
    }
}

/// A site-wide filter appended to every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPanelFilter {
    pub id: Uuid,
    pub is_inclusion: bool,
    pub sql_set_from: String,
    #[serde(default)]
    pub sql_set_where: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl GlobalPanelFilter {
    pub fn to_concept(&self) -> Concept {
        Concept {
            id: self.id,
            sql_set_from: self.sql_set_from.clone(),
            sql_set_where: self.sql_set_where.clone(),
            ui_display_name: self.description.clone(),
            ..Concept::default()
        }
    }
}

/// Outcome of one preflight check across all referenced resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightResources {
    pub concepts: ConceptPreflightCheck,
    pub queries: QueryPreflightCheck,
    pub imports: ImportPreflightCheck,
    #[serde(default)]
    pub global_panel_filters: Vec<GlobalPanelFilter>,
}

impl PreflightResources {
    pub fn ok(&self) -> bool {
        self.concepts.ok() && self.queries.ok() && self.imports.ok()
    }

    /// Only the failing entries; empty when [`ok`](Self::ok) holds.
    pub fn errors(&self) -> PreflightResourcesErrors {
        PreflightResourcesErrors {
            concept_errors: self.concepts.errors(),
            query_errors: self.queries.errors(),
            import_errors: self.imports.errors(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightResourcesErrors {
    pub concept_errors: Vec<ConceptPreflightCheckResult>,
    pub query_errors: Vec<QueryPreflightCheckResult>,
    pub import_errors: Vec<ImportPreflightCheckResult>,
}

impl PreflightResourcesErrors {
    pub fn is_empty(&self) -> bool {
        self.concept_errors.is_empty() && self.query_errors.is_empty() && self.import_errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.concept_errors.len() + self.query_errors.len() + self.import_errors.len()
    }
}
