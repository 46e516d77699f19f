//! # cohort-engine
//!
//! Executes validated cohort queries and turns the per-panel results into a
//! single cohort and a protected count.
//!
//! Three execution strategies are supported:
//!
//! - **Sequential**: panels run one at a time
//! - **Parallel**: panels run concurrently, bounded by `max_parallelism`
//! - **Combined**: the whole query is compiled into one statement
//!
//! For the first two the partial results are combined by
//! [`PatientCountAggregator`]: the intersection of every inclusion panel
//! minus the union of every exclusion panel.

mod aggregator;
mod error;
mod execution;
mod service;

pub use aggregator::PatientCountAggregator;
pub use error::{CohortError, Result};
pub use service::{
    CohortCountOutcome, CohortPlanOutcome, PatientCohortService, PatientCountResponse, PatientCountService,
};

pub use tokio_util::sync::CancellationToken;
