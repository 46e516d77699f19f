//! # cohort-privacy
//!
//! Protects results before they leave the process.
//!
//! - [`ObfuscationService`] perturbs or suppresses patient counts.
//! - [`Anonymizer`] pseudonymizes identifiers and shifts dates on
//!   patient-level records built by a [`MarshalPlan`].
//!
//! Which columns are protected is declared per [`Shape`] in static
//! [`FieldDescriptor`] tables and checked once when an anonymizer is built.

mod anonymizer;
mod error;
mod obfuscation;
mod record;
mod schema;
mod shape;

pub use anonymizer::{Anonymizer, pseudonym};
pub use error::{PrivacyError, Result};
pub use obfuscation::{ObfuscationService, canonical_seed};
pub use record::{DatasetRecord, FieldValue, MarshalPlan, RandomSalt, Row, SaltSource};
pub use schema::{FieldDescriptor, FieldType, Schema, columns};
pub use shape::Shape;
