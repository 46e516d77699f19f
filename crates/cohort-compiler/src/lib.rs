//! # cohort-compiler
//!
//! Turns a caller's stub query definition into a validated, executable
//! [`PatientCountQuery`](cohort_core::PatientCountQuery).
//!
//! ```ignore
//! let hydrator = PanelHydrator::new(reader, config.compiler.clone());
//! let ctx = hydrator.hydrate(&definition, &user).await?;
//! if !ctx.preflight_passed() {
//!     return Ok(Outcome::PreflightFailed(ctx.errors()));
//! }
//! let query = PanelValidator::new().validate(ctx)?;
//! ```

mod context;
mod error;
pub mod hydrator;
mod preflight;
pub mod resources;
mod validator;

pub use context::PanelValidationContext;
pub use error::{CompilerError, Result, ValidationError};
pub use hydrator::{PanelHydrator, localize_definition, merge_global_filters};
pub use preflight::PreflightResourceChecker;
pub use validator::PanelValidator;
