//! Patient-level records and marshalling backend rows into them.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::error::{PrivacyError, Result};
use crate::schema::{FieldDescriptor, FieldType, Schema, columns};

/// One backend result row, keyed by column name.
pub type Row = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    DateTime(OffsetDateTime),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            Self::DateTime(d) => Some(*d),
            _ => None,
        }
    }

    /// Converts a JSON value according to the declared column type.
    fn from_json(field: &FieldDescriptor, value: &Value) -> Result<Self> {
        let column = field.name();
        let invalid = |message: &str| PrivacyError::invalid_value(column, type_name(field.field_type), message);

        if value.is_null() {
            return Ok(Self::Null);
        }
        match field.field_type {
            FieldType::String | FieldType::Guid => match value {
                Value::String(s) => Ok(Self::String(s.clone())),
                Value::Number(n) => Ok(Self::String(n.to_string())),
                _ => Err(invalid("not a string")),
            },
            FieldType::DateTime => {
                let text = value.as_str().ok_or_else(|| invalid("not a string"))?;
                OffsetDateTime::parse(text, &Rfc3339)
                    .map(Self::DateTime)
                    .map_err(|e| invalid(&e.to_string()))
            }
            FieldType::Numeric => {
                if let Some(i) = value.as_i64() {
                    Ok(Self::Int(i))
                } else {
                    value.as_f64().map(Self::Float).ok_or_else(|| invalid("not a number"))
                }
            }
            FieldType::Bool => value.as_bool().map(Self::Bool).ok_or_else(|| invalid("not a boolean")),
        }
    }
}

fn type_name(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "a string",
        FieldType::Guid => "a guid",
        FieldType::DateTime => "an RFC 3339 timestamp",
        FieldType::Numeric => "a number",
        FieldType::Bool => "a boolean",
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::String(s) => serializer.serialize_str(s),
            Self::DateTime(d) => {
                let text = d.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

/// A patient-level record selected for export.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    /// Per-record random value feeding pseudonyms and the date shift.
    pub salt: Uuid,
    values: IndexMap<String, FieldValue>,
}

impl DatasetRecord {
    pub fn new(salt: Uuid) -> Self {
        Self {
            salt,
            values: IndexMap::new(),
        }
    }

    /// Missing columns read as [`FieldValue::Null`].
    pub fn get(&self, column: &str) -> &FieldValue {
        self.values.get(column).unwrap_or(&FieldValue::Null)
    }

    pub fn set(&mut self, column: impl Into<String>, value: FieldValue) {
        self.values.insert(column.into(), value);
    }

    pub fn with(mut self, column: impl Into<String>, value: FieldValue) -> Self {
        self.set(column, value);
        self
    }

    pub fn person_id(&self) -> Option<&str> {
        self.get(columns::PERSON_ID).as_str()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn get_mut(&mut self, column: &str) -> Option<&mut FieldValue> {
        self.values.get_mut(column)
    }
}

// The salt is internal and never leaves the process.
impl Serialize for DatasetRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Supplies salts for rows that do not carry one.
pub trait SaltSource: Send + Sync {
    fn next_salt(&self) -> Uuid;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSalt;

impl SaltSource for RandomSalt {
    fn next_salt(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// The schema fields present in one backend result set.
#[derive(Debug, Clone)]
pub struct MarshalPlan {
    fields: Vec<FieldDescriptor>,
    has_salt: bool,
}

impl MarshalPlan {
    /// Matches `columns` against `schema`.
    ///
    /// Columns not in the schema are ignored.
    ///
    /// # Errors
    ///
    /// Returns `PrivacyError::MissingColumn` if a required field is absent.
    pub fn new<S: AsRef<str>>(schema: &Schema, columns: &[S]) -> Result<Self> {
        let present = |name: &str| columns.iter().any(|c| c.as_ref() == name);

        if let Some(missing) = schema.fields().iter().find(|f| f.required && !present(f.name())) {
            return Err(PrivacyError::missing_column(missing.name()));
        }
        let fields = schema
            .fields()
            .iter()
            .filter(|f| present(f.name()))
            .cloned()
            .collect();
        Ok(Self {
            fields,
            has_salt: present(columns::SALT),
        })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Builds a record from one row.
    ///
    /// # Errors
    ///
    /// Returns an error if a value does not match its declared type or the
    /// salt column is not a UUID.
    pub fn marshal(&self, row: &Row, salt_source: &dyn SaltSource) -> Result<DatasetRecord> {
        let salt = match row.get(columns::SALT).filter(|_| self.has_salt) {
            Some(Value::String(s)) => Uuid::parse_str(s)
                .map_err(|e| PrivacyError::invalid_value(columns::SALT, "a guid", e.to_string()))?,
            Some(Value::Null) | None => salt_source.next_salt(),
            Some(_) => return Err(PrivacyError::invalid_value(columns::SALT, "a guid", "not a string")),
        };

        let mut record = DatasetRecord::new(salt);
        for field in &self.fields {
            let value = match row.get(field.name()) {
                Some(v) => FieldValue::from_json(field, v)?,
                None => FieldValue::Null,
            };
            record.set(field.name(), value);
        }
        Ok(record)
    }

    pub fn marshal_all(&self, rows: &[Row], salt_source: &dyn SaltSource) -> Result<Vec<DatasetRecord>> {
        rows.iter().map(|row| self.marshal(row, salt_source)).collect()
    }
}
