use cohort_core::{CoreError, NumericFilterType, ResourceRef};
use cohort_storage::StorageError;
use thiserror::Error;

/// Errors raised while hydrating a query definition.
///
/// An authorization failure is not one of these: it is reported through
/// [`PanelValidationContext::preflight_passed`](crate::PanelValidationContext::preflight_passed).
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("Preflight lookup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid query definition: {0}")]
    Core(#[from] CoreError),

    #[error("Reference {reference} passed preflight but was not resolved")]
    UnresolvedReference { reference: ResourceRef },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CompilerError {
    pub fn unresolved(reference: ResourceRef) -> Self {
        Self::UnresolvedReference { reference }
    }

    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Core(e) => e.is_client_error(),
            Self::Validation(_) => true,
            Self::Storage(_) | Self::UnresolvedReference { .. } => false,
        }
    }
}

/// Structural or filter violations found in a hydrated query.
///
/// Any one of these rejects the whole query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Preflight check failed, nothing to validate")]
    PreflightNotPassed,

    #[error("Panel {panel_index}: end date precedes start")]
    EndDatePrecedesStart { panel_index: i32 },

    #[error(
        "Specialization misalignment in panel {panel_index} item {item_index}: {reference} matched {matches} specializations"
    )]
    SpecializationMisalignment {
        panel_index: i32,
        item_index: i32,
        reference: ResourceRef,
        matches: usize,
    },

    #[error("Recency filter misalignment in panel {panel_index} item {item_index}: no recency type selected")]
    MissingRecencyType { panel_index: i32, item_index: i32 },

    #[error(
        "Numeric filter misalignment in panel {panel_index} item {item_index}: {filter_type:?} expects {expected} arguments, got {actual}"
    )]
    MissingNumericArguments {
        panel_index: i32,
        item_index: i32,
        filter_type: NumericFilterType,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Numeric filter misalignment in panel {panel_index} item {item_index}: {filter_type:?} expects {expected} arguments, got {actual}"
    )]
    ExcessiveNumericArguments {
        panel_index: i32,
        item_index: i32,
        filter_type: NumericFilterType,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_validation_messages_name_the_item() {
        let err = ValidationError::MissingNumericArguments {
            panel_index: 2,
            item_index: 1,
            filter_type: NumericFilterType::Between,
            expected: 2,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("panel 2 item 1"));
        assert!(msg.contains("Between expects 2 arguments, got 1"));
    }

    #[test]
    fn test_client_error_classification() {
        let err: CompilerError = ValidationError::PreflightNotPassed.into();
        assert!(err.is_client_error());

        let err: CompilerError = StorageError::timeout("slow").into();
        assert!(!err.is_client_error());

        let err = CompilerError::unresolved(ResourceRef::Id(Uuid::nil()));
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("was not resolved"));
    }
}
