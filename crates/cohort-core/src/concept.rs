//! Resolved concept metadata.
//!
//! A concept is the unit of cohort criteria: a SQL set with optional date,
//! numeric and event fields, plus display metadata and specialization groups.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reference::ResourceRef;
use crate::urn::Urn;
use crate::user::CallerMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Concept {
    pub id: Uuid,
    pub universal_id: Option<Urn>,
    pub parent_id: Option<Uuid>,
    pub root_id: Option<Uuid>,
    pub external_id: Option<String>,

    pub is_numeric: bool,
    pub is_event_based: bool,
    pub is_encounter_based: bool,
    pub is_parent: bool,
    pub is_patient_count_auto_calculated: bool,
    pub is_specializable: bool,

    pub sql_set_from: String,
    pub sql_set_where: Option<String>,
    pub sql_field_date: Option<String>,
    pub sql_field_numeric: Option<String>,
    pub sql_field_event_id: Option<String>,

    pub ui_display_name: Option<String>,
    pub ui_display_text: Option<String>,
    pub ui_display_subtext: Option<String>,
    pub ui_display_units: Option<String>,
    pub ui_display_tooltip: Option<String>,
    pub ui_display_patient_count: Option<u64>,
    pub ui_display_patient_count_by_year: Vec<ConceptPatientYearCount>,
    pub ui_numeric_default_text: Option<String>,

    pub specialization_groups: Vec<SpecializationGroup>,
}

impl Concept {
    pub fn new(id: Uuid, sql_set_from: impl Into<String>) -> Self {
        Self {
            id,
            root_id: Some(id),
            sql_set_from: sql_set_from.into(),
            ..Self::default()
        }
    }

    pub fn with_universal_id(mut self, urn: Urn) -> Self {
        self.universal_id = Some(urn);
        self
    }

    pub fn with_where(mut self, sql_set_where: impl Into<String>) -> Self {
        self.sql_set_where = Some(sql_set_where.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.ui_display_name = Some(name.into());
        self
    }

    pub fn with_specialization_group(mut self, group: SpecializationGroup) -> Self {
        self.is_specializable = true;
        self.specialization_groups.push(group);
        self
    }

    /// The reference a caller in `mode` would use for this concept.
    ///
    /// Returns `None` for federated callers when the concept has no
    /// universal id.
    pub fn reference(&self, mode: CallerMode) -> Option<ResourceRef> {
        match mode {
            CallerMode::Institutional => Some(ResourceRef::Id(self.id)),
            CallerMode::Federated => self.universal_id.clone().map(ResourceRef::UniversalId),
        }
    }

    /// All specializations across every group.
    pub fn specializations(&self) -> impl Iterator<Item = &Specialization> {
        self.specialization_groups
            .iter()
            .flat_map(|g| g.specializations.iter())
    }

    /// Specializations matching `reference` by local or universal id.
    pub fn find_specializations<'a>(&'a self, reference: &'a ResourceRef) -> Vec<&'a Specialization> {
        self.specializations()
            .filter(|s| s.matches(reference))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptPatientYearCount {
    pub year: Option<i32>,
    pub patient_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecializationGroup {
    pub id: i32,
    pub sql_set_id: i32,
    pub ui_default_text: String,
    pub specializations: Vec<Specialization>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Specialization {
    pub id: Uuid,
    pub universal_id: Option<Urn>,
    pub specialization_group_id: i32,
    pub sql_set_where: String,
    pub ui_display_text: String,
    pub order_id: Option<i32>,
}

impl Specialization {
    pub fn matches(&self, reference: &ResourceRef) -> bool {
        match reference {
            ResourceRef::Id(id) => self.id == *id,
            ResourceRef::UniversalId(urn) => self.universal_id.as_ref() == Some(urn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specialization(group: i32, text: &str) -> Specialization {
        Specialization {
            id: Uuid::new_v4(),
            universal_id: Some(format!("urn:leaf:concept:spec:{text}").parse().unwrap()),
            specialization_group_id: group,
            sql_set_where: format!("@.kind = '{text}'"),
            ui_display_text: text.to_string(),
            order_id: None,
        }
    }

    #[test]
    fn test_reference_by_mode() {
        let urn: Urn = "urn:leaf:concept:diag:code=1".parse().unwrap();
        let concept = Concept::new(Uuid::new_v4(), "dbo.Diagnosis").with_universal_id(urn.clone());

        assert_eq!(
            concept.reference(CallerMode::Institutional),
            Some(ResourceRef::Id(concept.id))
        );
        assert_eq!(
            concept.reference(CallerMode::Federated),
            Some(ResourceRef::UniversalId(urn))
        );

        let local_only = Concept::new(Uuid::new_v4(), "dbo.Diagnosis");
        assert_eq!(local_only.reference(CallerMode::Federated), None);
    }

    #[test]
    fn test_find_specializations_by_either_id() {
        let inpatient = specialization(1, "inpatient");
        let outpatient = specialization(1, "outpatient");
        let concept = Concept::new(Uuid::new_v4(), "dbo.Encounter").with_specialization_group(
            SpecializationGroup {
                id: 1,
                sql_set_id: 1,
                ui_default_text: "Any encounter".into(),
                specializations: vec![inpatient.clone(), outpatient],
            },
        );

        assert!(concept.is_specializable);
        assert_eq!(concept.specializations().count(), 2);

        let by_id = ResourceRef::Id(inpatient.id);
        assert_eq!(concept.find_specializations(&by_id), vec![&inpatient]);

        let by_urn = ResourceRef::UniversalId(inpatient.universal_id.clone().unwrap());
        assert_eq!(concept.find_specializations(&by_urn), vec![&inpatient]);

        let missing = ResourceRef::Id(Uuid::new_v4());
        assert!(concept.find_specializations(&missing).is_empty());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let concept: Concept = serde_json::from_value(serde_json::json!({
            "id": "00000000-0000-0000-0000-000000000001",
            "sqlSetFrom": "dbo.Patient",
            "isNumeric": true
        }))
        .unwrap();
        assert!(concept.is_numeric);
        assert_eq!(concept.sql_set_from, "dbo.Patient");
        assert!(concept.specialization_groups.is_empty());
    }
}
