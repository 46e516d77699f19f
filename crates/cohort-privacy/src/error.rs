//! Errors raised by the privacy layer.
//!
//! Every variant here points at a schema or configuration problem rather
//! than bad user input, so none of them should be swallowed.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrivacyError {
    /// A PHI field has no masking strategy and cannot be exported.
    #[error("PHI field '{field}' is not maskable")]
    UnmaskablePhi { field: String },

    /// A PHI field holds a value the anonymizer cannot mask.
    #[error("PHI field '{field}' holds a {kind} value, which cannot be masked")]
    UnsupportedPhiType { field: String, kind: &'static str },

    #[error("Required column '{column}' is missing from the result")]
    MissingColumn { column: String },

    #[error("Column '{column}' expected {expected}: {message}")]
    InvalidValue {
        column: String,
        expected: &'static str,
        message: String,
    },

    #[error("Invalid date shift range [{lower}, {upper}]")]
    InvalidShiftRange { lower: i32, upper: i32 },

    /// An enabled obfuscation with no shift would report true counts.
    #[error("Obfuscation shift must be > 0 when obfuscation is enabled")]
    ZeroObfuscationShift,

    /// Shifting a date PHI value left the representable range.
    #[error("Date in column '{column}' cannot be shifted by {shift}")]
    DateOutOfRange { column: String, shift: time::Duration },

    #[error("Dynamic shape requires an explicit field list")]
    MissingDynamicSchema,

    #[error("Unknown shape '{0}'")]
    UnknownShape(String),
}

impl PrivacyError {
    #[must_use]
    pub fn unmaskable(field: impl Into<String>) -> Self {
        Self::UnmaskablePhi { field: field.into() }
    }

    #[must_use]
    pub fn unsupported(field: impl Into<String>, kind: &'static str) -> Self {
        Self::UnsupportedPhiType {
            field: field.into(),
            kind,
        }
    }

    #[must_use]
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn { column: column.into() }
    }

    #[must_use]
    pub fn invalid_value(column: impl Into<String>, expected: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            expected,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn date_out_of_range(column: impl Into<String>, shift: time::Duration) -> Self {
        Self::DateOutOfRange {
            column: column.into(),
            shift,
        }
    }

    /// Errors caused by the shape of incoming data rather than by the schema.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::InvalidValue { .. } | Self::DateOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PrivacyError>;
