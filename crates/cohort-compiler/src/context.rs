use cohort_core::{Panel, PreflightResources, PreflightResourcesErrors};
use uuid::Uuid;

/// Output of hydration and input to validation.
///
/// When the preflight check failed, `panels` is always empty and only the
/// preflight results are carried.
#[derive(Debug, Clone)]
pub struct PanelValidationContext {
    pub query_id: Option<Uuid>,
    pub preflight: PreflightResources,
    pub panels: Vec<Panel>,
}

impl PanelValidationContext {
    pub(crate) fn failed(query_id: Option<Uuid>, preflight: PreflightResources) -> Self {
        Self {
            query_id,
            preflight,
            panels: Vec::new(),
        }
    }

    pub(crate) fn passed(query_id: Option<Uuid>, preflight: PreflightResources, panels: Vec<Panel>) -> Self {
        Self {
            query_id,
            preflight,
            panels,
        }
    }

    pub fn preflight_passed(&self) -> bool {
        self.preflight.ok()
    }

    pub fn errors(&self) -> PreflightResourcesErrors {
        self.preflight.errors()
    }
}
