//! Deterministic count obfuscation.
//!
//! Re-running a query, or any rearrangement of it, must not let a caller
//! average away the noise. The perturbation is therefore derived from the
//! set of concepts the query touches and nothing else.

use cohort_config::ObfuscationOptions;
use cohort_core::{PatientCount, PatientCountQuery};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{PrivacyError, Result};

#[derive(Debug, Clone, Copy)]
pub struct ObfuscationService {
    options: ObfuscationOptions,
}

impl ObfuscationService {
    /// # Errors
    ///
    /// Returns `PrivacyError::ZeroObfuscationShift` if obfuscation is enabled
    /// with a zero shift.
    pub fn new(options: ObfuscationOptions) -> Result<Self> {
        if options.enabled && options.shift == 0 {
            return Err(PrivacyError::ZeroObfuscationShift);
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &ObfuscationOptions {
        &self.options
    }

    /// Protects `true_count` for a query.
    ///
    /// Counts at or below the threshold are replaced by the shift magnitude.
    /// Larger counts move by a non-zero amount within `±shift`, fixed for the
    /// concept multiset of `query`.
    pub fn obfuscate(&self, true_count: u64, query: &PatientCountQuery) -> PatientCount {
        let ObfuscationOptions {
            enabled,
            threshold,
            shift,
        } = self.options;

        if !enabled {
            return PatientCount::exact(true_count);
        }
        if true_count <= threshold {
            return PatientCount {
                value: shift,
                plus_minus: 0,
                under_threshold: true,
            };
        }

        let mut rng = StdRng::from_seed(canonical_seed(query));
        let delta = nonzero_in(&mut rng, shift);
        PatientCount {
            value: true_count.saturating_add_signed(delta),
            plus_minus: shift,
            under_threshold: false,
        }
    }
}

/// Hash of every concept id in the query, sorted.
///
/// Duplicates are kept, so the seed depends on the concept multiset and not
/// on panel, sub-panel or item order.
pub fn canonical_seed(query: &PatientCountQuery) -> [u8; 32] {
    let mut ids: Vec<Uuid> = query.concepts().map(|c| c.id).collect();
    ids.sort_unstable();

    let mut hasher = Sha256::new();
    for id in &ids {
        hasher.update(id.as_bytes());
    }
    hasher.finalize().into()
}

/// Uniform draw from `[-magnitude, magnitude]` without zero.
fn nonzero_in(rng: &mut StdRng, magnitude: u64) -> i64 {
    let bound = i64::try_from(magnitude).unwrap_or(i64::MAX);
    let drawn = rng.gen_range(-bound..bound);
    if drawn >= 0 { drawn + 1 } else { drawn }
}
