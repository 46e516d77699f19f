use thiserror::Error;

/// Core error types for cohort model operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid universal identifier: {0}")]
    InvalidUrn(String),

    #[error("Invalid resource reference: {0}")]
    InvalidReference(String),

    #[error("Invalid query definition: {message}")]
    InvalidDefinition { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),
}

impl CoreError {
    /// Create a new InvalidUrn error
    pub fn invalid_urn(urn: impl Into<String>) -> Self {
        Self::InvalidUrn(urn.into())
    }

    /// Create a new InvalidReference error
    pub fn invalid_reference(reference: impl Into<String>) -> Self {
        Self::InvalidReference(reference.into())
    }

    /// Create a new InvalidDefinition error
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }

    /// Check if this error was caused by caller input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrn(_)
                | Self::InvalidReference(_)
                | Self::InvalidDefinition { .. }
                | Self::JsonError(_)
        )
    }

    /// Check if this error is a server-side fault
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::UuidError(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrn(_) | Self::InvalidReference(_) | Self::InvalidDefinition { .. } => {
                ErrorCategory::Validation
            }
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::UuidError(_) => ErrorCategory::System,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Serialization,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_urn_error() {
        let err = CoreError::invalid_urn("urn:bogus:thing");
        assert_eq!(
            err.to_string(),
            "Invalid universal identifier: urn:bogus:thing"
        );
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let core_err: CoreError = json_err.into();

        assert!(matches!(core_err, CoreError::JsonError(_)));
        assert!(core_err.is_client_error());
        assert_eq!(core_err.category(), ErrorCategory::Serialization);
    }

    #[test]
    fn test_uuid_error_conversion() {
        match uuid::Uuid::parse_str("not-a-uuid") {
            Err(uuid_err) => {
                let core_err: CoreError = uuid_err.into();
                assert!(core_err.is_server_error());
                assert_eq!(core_err.category(), ErrorCategory::System);
            }
            Ok(_) => panic!("Expected UUID parsing to fail"),
        }
    }

    #[test]
    fn test_error_categories_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Serialization.to_string(), "serialization");
        assert_eq!(ErrorCategory::System.to_string(), "system");
    }
}
