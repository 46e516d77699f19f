//! Pseudonymization and date shifting of exported records.

use cohort_config::{DateShiftIncrement, DateShiftOptions, Pepper};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use time::Duration;
use uuid::Uuid;

use crate::error::{PrivacyError, Result};
use crate::record::{DatasetRecord, FieldValue};
use crate::schema::{FieldDescriptor, Schema};

/// Masks the PHI columns of records sharing one schema.
///
/// String PHI is replaced by a pseudonym derived from the pepper, the
/// record's salt and the original value. Date PHI is moved by one offset per
/// record, so intervals inside a record survive. Nulls stay null and non-PHI
/// columns are untouched.
#[derive(Debug, Clone)]
pub struct Anonymizer {
    pepper: Pepper,
    phi: Vec<FieldDescriptor>,
    date_shift: DateShiftOptions,
}

impl Anonymizer {
    /// # Errors
    ///
    /// Returns `PrivacyError::UnmaskablePhi` if any PHI field in `schema` is
    /// not maskable, and `PrivacyError::InvalidShiftRange` if the date shift
    /// range is empty.
    pub fn new(pepper: Pepper, schema: &Schema, date_shift: DateShiftOptions) -> Result<Self> {
        if let Some(field) = schema.fields().iter().find(|f| f.is_unmaskable_phi()) {
            return Err(PrivacyError::unmaskable(field.name()));
        }
        if date_shift.lower_bound >= date_shift.upper_bound {
            return Err(PrivacyError::InvalidShiftRange {
                lower: date_shift.lower_bound,
                upper: date_shift.upper_bound,
            });
        }
        Ok(Self {
            pepper,
            phi: schema.phi_fields().cloned().collect(),
            date_shift,
        })
    }

    /// Masks every PHI column of `record` in place.
    ///
    /// The record is checked before anything is changed, so on error it is
    /// left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `PrivacyError::UnsupportedPhiType` for a non-null numeric or
    /// boolean PHI value, and `PrivacyError::DateOutOfRange` if a shifted
    /// date would leave the representable range.
    pub fn anonymize(&self, record: &mut DatasetRecord) -> Result<()> {
        let salt = record.salt;
        let shift = self.date_shift(salt);

        let mut shifted = Vec::new();
        for field in &self.phi {
            match record.get(field.name()) {
                FieldValue::DateTime(value) => {
                    let moved = value
                        .checked_add(shift)
                        .ok_or_else(|| PrivacyError::date_out_of_range(field.name(), shift))?;
                    shifted.push((field.name(), moved));
                }
                value @ (FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Bool(_)) => {
                    return Err(PrivacyError::unsupported(field.name(), value.kind()));
                }
                _ => {}
            }
        }

        for field in &self.phi {
            if let Some(FieldValue::String(value)) = record.get_mut(field.name()) {
                *value = pseudonym(self.pepper.expose(), salt, value);
            }
        }
        for (name, moved) in shifted {
            if let Some(FieldValue::DateTime(value)) = record.get_mut(name) {
                *value = moved;
            }
        }
        Ok(())
    }

    pub fn anonymize_all(&self, records: &mut [DatasetRecord]) -> Result<()> {
        records.iter_mut().try_for_each(|r| self.anonymize(r))
    }

    /// The offset applied to every date in a record with this salt.
    ///
    /// Never zero, so every non-null date moves.
    pub fn date_shift(&self, salt: Uuid) -> Duration {
        let DateShiftOptions {
            increment,
            lower_bound,
            upper_bound,
        } = self.date_shift;

        let seed: [u8; 32] = Sha256::digest(salt.as_bytes()).into();
        let mut rng = StdRng::from_seed(seed);
        let amount = if lower_bound <= 0 && 0 <= upper_bound {
            let drawn = rng.gen_range(lower_bound..upper_bound);
            if drawn >= 0 { drawn + 1 } else { drawn }
        } else {
            rng.gen_range(lower_bound..=upper_bound)
        };

        let amount = i64::from(amount);
        match increment {
            DateShiftIncrement::Minute => Duration::minutes(amount),
            DateShiftIncrement::Hour => Duration::hours(amount),
            DateShiftIncrement::Day => Duration::days(amount),
        }
    }
}

/// Keyed, salted pseudonym for `value`.
///
/// SHA-256 over the length-prefixed pepper, salt and value, hex encoded.
pub fn pseudonym(pepper: &[u8], salt: Uuid, value: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [pepper, salt.as_bytes().as_slice(), value.as_bytes()] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}
