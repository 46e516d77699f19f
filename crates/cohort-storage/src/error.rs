//! Error types raised by collaborator backends.
//!
//! Backend-specific failures are translated into these variants at the
//! boundary so the pipeline only deals with one taxonomy.

use std::fmt;

/// Errors that can occur while talking to a backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// A referenced record was not found.
    #[error("Not found: {kind}/{id}")]
    NotFound {
        /// The kind of record that was not found.
        kind: String,
        /// Its identifier.
        id: String,
    },

    /// A panel or query could not be compiled into a statement.
    #[error("Compile error: {message}")]
    CompileError {
        /// Description of the compile failure.
        message: String,
    },

    /// The backend rejected the statement.
    #[error("Query error: {message}")]
    QueryError {
        /// Description of the failure.
        message: String,
    },

    /// Failed to connect to the backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// The backend did not answer in time.
    #[error("Timeout: {message}")]
    Timeout {
        /// Description of what timed out.
        message: String,
    },

    /// An internal backend error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `CompileError` error.
    #[must_use]
    pub fn compile_error(message: impl Into<String>) -> Self {
        Self::CompileError {
            message: message.into(),
        }
    }

    /// Creates a new `QueryError` error.
    #[must_use]
    pub fn query_error(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for failures that may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError { .. } | Self::Timeout { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::CompileError { .. } => ErrorCategory::Compilation,
            Self::QueryError { .. } => ErrorCategory::Execution,
            Self::ConnectionError { .. } | Self::Timeout { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Record not found.
    NotFound,
    /// Statement compilation failed.
    Compilation,
    /// Statement execution failed.
    Execution,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Compilation => write!(f, "compilation"),
            Self::Execution => write!(f, "execution"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("query", "123");
        assert_eq!(err.to_string(), "Not found: query/123");

        let err = StorageError::timeout("panel 2 after 30s");
        assert_eq!(err.to_string(), "Timeout: panel 2 after 30s");
    }

    #[test]
    fn test_error_predicates() {
        assert!(StorageError::not_found("query", "1").is_not_found());
        assert!(StorageError::connection_error("refused").is_transient());
        assert!(StorageError::timeout("slow").is_transient());
        assert!(!StorageError::query_error("syntax").is_transient());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::compile_error("no set").category(),
            ErrorCategory::Compilation
        );
        assert_eq!(
            StorageError::query_error("bad").category(),
            ErrorCategory::Execution
        );
        assert_eq!(
            StorageError::timeout("slow").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
