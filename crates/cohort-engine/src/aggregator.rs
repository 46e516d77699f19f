//! Set algebra over per-panel partial results.

use std::collections::HashSet;

use cohort_core::PartialPatientCountContext;

/// Combines partial results into one cohort.
///
/// The result is the intersection of every inclusion set minus the union of
/// every exclusion set. With no inclusion sets the result is empty: exclusions
/// alone never select anyone. Input order does not affect the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatientCountAggregator;

impl PatientCountAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate<I>(&self, partials: I) -> HashSet<String>
    where
        I: IntoIterator<Item = PartialPatientCountContext>,
    {
        let (mut inclusions, exclusions): (Vec<_>, Vec<_>) =
            partials.into_iter().partition(|p| p.is_inclusion_criteria);

        // Smallest first keeps the running intersection small.
        inclusions.sort_by_key(|p| p.patient_ids.len());
        let mut inclusions = inclusions.into_iter();
        let Some(first) = inclusions.next() else {
            return HashSet::new();
        };

        let mut result = first.patient_ids;
        for partial in inclusions {
            result.retain(|id| partial.patient_ids.contains(id));
            if result.is_empty() {
                return result;
            }
        }
        for partial in &exclusions {
            result.retain(|id| !partial.patient_ids.contains(id));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_inclusion_is_identity() {
        let result = PatientCountAggregator::new()
            .aggregate([PartialPatientCountContext::inclusion(["123", "234", "345", "456"])]);
        assert_eq!(result, set(&["123", "234", "345", "456"]));
    }

    #[test]
    fn test_inclusion_intersection_minus_exclusion_any_order() {
        let a = PartialPatientCountContext::inclusion(["123", "234", "345", "456"]);
        let b = PartialPatientCountContext::inclusion(["234", "345", "456"]);
        let c = PartialPatientCountContext::exclusion(["456"]);
        let expected = set(&["234", "345"]);

        let orders = [
            vec![a.clone(), b.clone(), c.clone()],
            vec![a.clone(), c.clone(), b.clone()],
            vec![b.clone(), a.clone(), c.clone()],
            vec![b.clone(), c.clone(), a.clone()],
            vec![c.clone(), a.clone(), b.clone()],
            vec![c, b, a],
        ];
        for order in orders {
            assert_eq!(PatientCountAggregator::new().aggregate(order), expected);
        }
    }

    #[test]
    fn test_only_exclusions_is_empty() {
        let result = PatientCountAggregator::new().aggregate([
            PartialPatientCountContext::exclusion(["1", "2"]),
            PartialPatientCountContext::exclusion(["3"]),
        ]);
        assert!(result.is_empty());
        assert!(PatientCountAggregator::new().aggregate(Vec::new()).is_empty());
    }

    fn partials() -> impl Strategy<Value = Vec<PartialPatientCountContext>> {
        prop::collection::vec(
            (prop::collection::hash_set(0u8..40, 0..20), any::<bool>()),
            0..8,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .map(|(ids, is_inclusion_criteria)| PartialPatientCountContext {
                    patient_ids: ids.into_iter().map(|i| i.to_string()).collect(),
                    is_inclusion_criteria,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn aggregation_ignores_input_order(input in partials(), seed in any::<u64>()) {
            let aggregator = PatientCountAggregator::new();
            let forward = aggregator.aggregate(input.clone());

            let mut rotated = input.clone();
            if !rotated.is_empty() {
                let k = (seed as usize) % rotated.len();
                rotated.rotate_left(k);
            }
            rotated.reverse();
            prop_assert_eq!(forward, aggregator.aggregate(rotated));
        }

        #[test]
        fn result_is_within_every_inclusion_and_outside_every_exclusion(input in partials()) {
            let result = PatientCountAggregator::new().aggregate(input.clone());
            for partial in &input {
                if partial.is_inclusion_criteria {
                    prop_assert!(result.is_subset(&partial.patient_ids));
                } else {
                    prop_assert!(result.is_disjoint(&partial.patient_ids));
                }
            }
        }
    }
}
