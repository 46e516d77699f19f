//! Partial and final execution results.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One panel's raw result: the matching patient ids and whether the panel
/// includes or excludes them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialPatientCountContext {
    pub patient_ids: HashSet<String>,
    pub is_inclusion_criteria: bool,
}

impl PartialPatientCountContext {
    pub fn inclusion<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patient_ids: ids.into_iter().map(Into::into).collect(),
            is_inclusion_criteria: true,
        }
    }

    pub fn exclusion<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            is_inclusion_criteria: false,
            ..Self::inclusion(ids)
        }
    }
}

/// The aggregated cohort for one query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientCohort {
    pub query_id: Option<Uuid>,
    pub patient_ids: HashSet<String>,
    /// Executed statements, kept for audit.
    pub sql_statements: Vec<String>,
}

impl PatientCohort {
    pub fn count(&self) -> usize {
        self.patient_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patient_ids.is_empty()
    }

    /// Patient ids in a stable order, for display and export.
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.patient_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// A count safe to return to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientCount {
    pub value: u64,
    pub plus_minus: u64,
    pub under_threshold: bool,
}

impl PatientCount {
    pub fn exact(value: u64) -> Self {
        Self {
            value,
            plus_minus: 0,
            under_threshold: false,
        }
    }
}
