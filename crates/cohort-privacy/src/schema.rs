//! Field descriptor tables for exported records.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known column names shared by every shape.
pub mod columns {
    pub const SALT: &str = "Salt";
    pub const PERSON_ID: &str = "personId";
    pub const ENCOUNTER_ID: &str = "encounterId";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    DateTime,
    Numeric,
    Bool,
    Guid,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::DateTime => "datetime",
            Self::Numeric => "numeric",
            Self::Bool => "bool",
            Self::Guid => "guid",
        };
        f.write_str(name)
    }
}

/// Metadata for one exported column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: Cow<'static, str>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub phi: bool,
    #[serde(default)]
    pub mask: bool,
    #[serde(default)]
    pub required: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, field_type: FieldType, phi: bool, mask: bool, required: bool) -> Self {
        Self {
            name: Cow::Borrowed(name),
            field_type,
            phi,
            mask,
            required,
        }
    }

    /// A column with no protection requirements.
    pub const fn plain(name: &'static str, field_type: FieldType) -> Self {
        Self::new(name, field_type, false, false, false)
    }

    /// PHI that the anonymizer pseudonymizes or shifts.
    pub const fn masked(name: &'static str, field_type: FieldType) -> Self {
        Self::new(name, field_type, true, true, false)
    }

    /// The required, masked patient identifier column.
    pub const fn person_id() -> Self {
        Self::new(columns::PERSON_ID, FieldType::String, true, true, true)
    }

    /// Descriptor built at runtime, e.g. for dynamic datasets.
    pub fn dynamic(name: impl Into<String>, field_type: FieldType, phi: bool, mask: bool) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            field_type,
            phi,
            mask,
            required: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// PHI without a masking strategy.
    pub fn is_unmaskable_phi(&self) -> bool {
        self.phi && !self.mask
    }
}

/// An ordered list of field descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Cow<'static, [FieldDescriptor]>,
}

impl Schema {
    pub const fn from_static(fields: &'static [FieldDescriptor]) -> Self {
        Self {
            fields: Cow::Borrowed(fields),
        }
    }

    pub fn dynamic(fields: Vec<FieldDescriptor>) -> Self {
        Self {
            fields: Cow::Owned(fields),
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn phi_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.phi)
    }

    /// The schema with unmaskable PHI columns removed.
    ///
    /// Required columns are kept even if unmaskable, so a schema that
    /// requires unmaskable PHI still fails anonymizer construction.
    pub fn deidentified(&self) -> Self {
        let fields = self
            .fields
            .iter()
            .filter(|f| f.required || !f.is_unmaskable_phi())
            .cloned()
            .collect();
        Self::dynamic(fields)
    }
}
