use cohort_compiler::{CompilerError, ValidationError};
use cohort_privacy::PrivacyError;
use cohort_storage::StorageError;
use thiserror::Error;

/// Errors raised while producing a cohort or count.
#[derive(Debug, Error)]
pub enum CohortError {
    #[error("Query rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Hydration failed: {0}")]
    Compiler(#[from] CompilerError),

    /// A partial query failed; no partial result was aggregated.
    #[error("Execution failed: {0}")]
    ExecutionFailed(StorageError),

    #[error("Caching cohort failed: {0}")]
    CacheFailed(StorageError),

    #[error("Invalid privacy settings: {0}")]
    Privacy(#[from] PrivacyError),

    /// The caller cancelled; nothing was aggregated or cached.
    #[error("Operation cancelled")]
    Cancelled,
}

impl CohortError {
    pub fn execution_failed(err: StorageError) -> Self {
        Self::ExecutionFailed(err)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Compiler(e) => e.is_client_error(),
            Self::ExecutionFailed(_) | Self::CacheFailed(_) | Self::Privacy(_) | Self::Cancelled => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CohortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CohortError::Cancelled.is_cancelled());
        assert!(!CohortError::Cancelled.is_client_error());

        let err: CohortError = ValidationError::PreflightNotPassed.into();
        assert!(err.is_client_error());

        let err = CohortError::execution_failed(StorageError::timeout("panel 1"));
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "Execution failed: Timeout: panel 1");
    }
}
