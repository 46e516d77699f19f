//! Clinical data shapes and their column tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PrivacyError, Result};
use crate::schema::{FieldDescriptor, Schema, columns};

use crate::schema::FieldType::{Bool, DateTime, Numeric, String as Text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shape {
    Observation,
    Encounter,
    Condition,
    Procedure,
    Immunization,
    Allergy,
    MedicationRequest,
    MedicationAdministration,
    Demographic,
    /// Columns are only known at runtime.
    Dynamic,
}

impl Shape {
    pub const ALL: [Shape; 10] = [
        Shape::Observation,
        Shape::Encounter,
        Shape::Condition,
        Shape::Procedure,
        Shape::Immunization,
        Shape::Allergy,
        Shape::MedicationRequest,
        Shape::MedicationAdministration,
        Shape::Demographic,
        Shape::Dynamic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Encounter => "encounter",
            Self::Condition => "condition",
            Self::Procedure => "procedure",
            Self::Immunization => "immunization",
            Self::Allergy => "allergy",
            Self::MedicationRequest => "medicationRequest",
            Self::MedicationAdministration => "medicationAdministration",
            Self::Demographic => "demographic",
            Self::Dynamic => "dynamic",
        }
    }

    /// The static column table, or `None` for [`Shape::Dynamic`].
    pub fn fields(&self) -> Option<&'static [FieldDescriptor]> {
        let table = match self {
            Self::Observation => OBSERVATION,
            Self::Encounter => ENCOUNTER,
            Self::Condition => CONDITION,
            Self::Procedure => PROCEDURE,
            Self::Immunization => IMMUNIZATION,
            Self::Allergy => ALLERGY,
            Self::MedicationRequest => MEDICATION_REQUEST,
            Self::MedicationAdministration => MEDICATION_ADMINISTRATION,
            Self::Demographic => DEMOGRAPHIC,
            Self::Dynamic => return None,
        };
        Some(table)
    }

    /// Schema for this shape. `Dynamic` requires `dynamic_fields`.
    pub fn schema(&self, dynamic_fields: Option<Vec<FieldDescriptor>>) -> Result<Schema> {
        match (self.fields(), dynamic_fields) {
            (Some(table), _) => Ok(Schema::from_static(table)),
            (None, Some(fields)) => {
                let mut fields = fields;
                if !fields.iter().any(|f| f.name == columns::PERSON_ID) {
                    fields.insert(0, FieldDescriptor::person_id());
                }
                Ok(Schema::dynamic(fields))
            }
            (None, None) => Err(PrivacyError::MissingDynamicSchema),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shape {
    type Err = PrivacyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|shape| shape.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PrivacyError::UnknownShape(s.to_string()))
    }
}

const OBSERVATION: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::masked(columns::ENCOUNTER_ID, Text),
    FieldDescriptor::plain("category", Text),
    FieldDescriptor::plain("code", Text),
    FieldDescriptor::masked("effectiveDate", DateTime),
    FieldDescriptor::plain("referenceRangeLow", Numeric),
    FieldDescriptor::plain("referenceRangeHigh", Numeric),
    FieldDescriptor::plain("specimenType", Text),
    FieldDescriptor::plain("valueString", Text),
    FieldDescriptor::plain("valueQuantity", Numeric),
    FieldDescriptor::plain("valueUnit", Text),
];

const ENCOUNTER: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::masked(columns::ENCOUNTER_ID, Text),
    FieldDescriptor::masked("admitDate", DateTime),
    FieldDescriptor::plain("admitSource", Text),
    FieldDescriptor::plain("class", Text),
    FieldDescriptor::masked("dischargeDate", DateTime),
    FieldDescriptor::plain("dischargeDisposition", Text),
    FieldDescriptor::plain("location", Text),
    FieldDescriptor::plain("status", Text),
];

const CONDITION: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::masked(columns::ENCOUNTER_ID, Text),
    FieldDescriptor::masked("abatementDateTime", DateTime),
    FieldDescriptor::plain("category", Text),
    FieldDescriptor::plain("code", Text),
    FieldDescriptor::plain("coding", Text),
    FieldDescriptor::masked("onsetDateTime", DateTime),
    FieldDescriptor::masked("recordedDate", DateTime),
    FieldDescriptor::plain("text", Text),
];

const PROCEDURE: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::masked(columns::ENCOUNTER_ID, Text),
    FieldDescriptor::plain("category", Text),
    FieldDescriptor::plain("code", Text),
    FieldDescriptor::plain("coding", Text),
    FieldDescriptor::masked("performedDateTime", DateTime),
    FieldDescriptor::plain("text", Text),
];

const IMMUNIZATION: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::masked(columns::ENCOUNTER_ID, Text),
    FieldDescriptor::plain("coding", Text),
    FieldDescriptor::plain("doseQuantity", Numeric),
    FieldDescriptor::plain("doseUnit", Text),
    FieldDescriptor::masked("occurrenceDateTime", DateTime),
    FieldDescriptor::plain("route", Text),
    FieldDescriptor::plain("text", Text),
    FieldDescriptor::plain("vaccineCode", Text),
];

const ALLERGY: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::masked(columns::ENCOUNTER_ID, Text),
    FieldDescriptor::plain("category", Text),
    FieldDescriptor::plain("code", Text),
    FieldDescriptor::plain("coding", Text),
    FieldDescriptor::masked("onsetDateTime", DateTime),
    FieldDescriptor::masked("recordedDate", DateTime),
    FieldDescriptor::plain("text", Text),
];

const MEDICATION_REQUEST: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::masked(columns::ENCOUNTER_ID, Text),
    FieldDescriptor::plain("amount", Numeric),
    FieldDescriptor::masked("authoredOn", DateTime),
    FieldDescriptor::plain("category", Text),
    FieldDescriptor::plain("code", Text),
    FieldDescriptor::plain("coding", Text),
    FieldDescriptor::plain("form", Text),
    FieldDescriptor::plain("text", Text),
    FieldDescriptor::plain("unit", Text),
];

const MEDICATION_ADMINISTRATION: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::masked(columns::ENCOUNTER_ID, Text),
    FieldDescriptor::plain("code", Text),
    FieldDescriptor::plain("coding", Text),
    FieldDescriptor::plain("doseQuantity", Numeric),
    FieldDescriptor::plain("doseUnit", Text),
    FieldDescriptor::masked("effectiveDateTime", DateTime),
    FieldDescriptor::plain("route", Text),
    FieldDescriptor::plain("text", Text),
];

// Name and MRN have no masking strategy: de-identified exports drop them.
const DEMOGRAPHIC: &[FieldDescriptor] = &[
    FieldDescriptor::person_id(),
    FieldDescriptor::plain("addressPostalCode", Text),
    FieldDescriptor::plain("addressState", Text),
    FieldDescriptor::plain("ethnicity", Text),
    FieldDescriptor::plain("gender", Text),
    FieldDescriptor::plain("language", Text),
    FieldDescriptor::plain("maritalStatus", Text),
    FieldDescriptor::plain("race", Text),
    FieldDescriptor::plain("religion", Text),
    FieldDescriptor::plain("marriedBoolean", Bool),
    FieldDescriptor::plain("hispanicBoolean", Bool),
    FieldDescriptor::plain("deceasedBoolean", Bool),
    FieldDescriptor::masked("birthDate", DateTime),
    FieldDescriptor::masked("deceasedDateTime", DateTime),
    FieldDescriptor::new("name", Text, true, false, false),
    FieldDescriptor::new("mrn", Text, true, false, false),
];
