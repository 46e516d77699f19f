//! # cohort-core
//!
//! Domain model shared by every cohort crate.
//!
//! ## Overview
//!
//! - [`urn`]: universal identifiers (`urn:leaf:<kind>:...`)
//! - [`reference`]: tagged references to concepts, saved queries and imports
//! - [`concept`]: resolved concept metadata and specializations
//! - [`definition`]: stub query definitions as submitted by callers
//! - [`panel`]: the hydrated, executable panel AST
//! - [`preflight`]: authorization/presence check results
//! - [`cohort`]: partial and final execution results
//! - [`user`]: caller identity and addressing mode

pub mod cohort;
pub mod concept;
pub mod definition;
pub mod error;
pub mod panel;
pub mod preflight;
pub mod reference;
pub mod urn;
pub mod user;

pub use cohort::{PartialPatientCountContext, PatientCohort, PatientCount};
pub use concept::{Concept, ConceptPatientYearCount, Specialization, SpecializationGroup};
pub use definition::{PanelDto, PanelFilterDto, PanelItemDto, QueryDefinition, SubPanelDto};
pub use error::{CoreError, ErrorCategory, Result};
pub use panel::{
    DateBoundary, DateFilter, DateIncrementType, JoinSequence, NumericFilter, NumericFilterType,
    Panel, PanelItem, PanelType, PatientCountQuery, RecencyFilterType, SequenceType, SubPanel,
};
pub use preflight::{
    ConceptPreflightCheck, ConceptPreflightCheckResult, GlobalPanelFilter, ImportPreflightCheck,
    ImportPreflightCheckResult, PreflightResources, PreflightResourcesErrors, QueryPreflightCheck,
    QueryPreflightCheckResult,
};
pub use reference::{ResourceKind, ResourceRef, ResourceRefs};
pub use urn::{ImportUrnArgs, Urn, UrnKind};
pub use user::{CallerMode, UserContext};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        CallerMode, Concept, CoreError, Panel, PanelItem, PatientCohort, PatientCount,
        PatientCountQuery, PreflightResources, QueryDefinition, ResourceKind, ResourceRef, SubPanel,
        Urn, UserContext,
    };
}
