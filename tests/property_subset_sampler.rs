use proptest::prelude::*;
use std::collections::HashSet;

use rsa_engine::services::{normalize, sample};
use rsa_engine::{ConfigOverrides, EngineProfile};

proptest! {
    /// Property: a subset never repeats an index and stays in range
    #[test]
    fn prop_sample_distinct_and_in_range(
        total in 1usize..64,
        size in 0usize..80,
        offset in any::<i64>(),
    ) {
        let picked = sample(total, size, offset);

        prop_assert_eq!(picked.len(), size.min(total));
        prop_assert!(picked.iter().all(|&i| i < total));
        let unique: HashSet<_> = picked.iter().collect();
        prop_assert_eq!(unique.len(), picked.len());
    }

    /// Property: the subset is a contiguous window starting at offset mod total
    #[test]
    fn prop_sample_is_rotating_window(
        (total, size) in (2usize..64).prop_flat_map(|total| (Just(total), 1..total)),
        offset in -1000i64..1000,
    ) {
        let picked = sample(total, size, offset);
        let start = offset.rem_euclid(total as i64) as usize;

        prop_assert_eq!(picked[0], start);
        for pair in picked.windows(2) {
            prop_assert_eq!(pair[1], (pair[0] + 1) % total);
        }
    }

    /// Property: same inputs, same subset
    #[test]
    fn prop_sample_deterministic(total in 1usize..32, size in 0usize..32, offset in any::<i64>()) {
        prop_assert_eq!(sample(total, size, offset), sample(total, size, offset));
    }

    /// Property: any accepted config satisfies the cross-field invariants
    #[test]
    fn prop_normalized_config_invariants(
        n in -5i64..40,
        k in -5i64..40,
        t in -5i64..40,
        p in -5i64..40,
        stable in any::<bool>(),
    ) {
        let overrides = ConfigOverrides::default()
            .with_population_size(n)
            .with_aggregation_size(k)
            .with_steps(t)
            .with_parallelism(p);
        let profile = EngineProfile { stable_profile: stable, tolerate_call_failures: false };

        if let Ok(normalized) = normalize(&overrides, profile) {
            let c = normalized.config;
            prop_assert!(c.aggregation_size <= c.population_size);
            prop_assert!(c.parallelism <= c.population_size);
            prop_assert!(c.population_size * c.steps <= 96);
            if stable {
                prop_assert!(c.population_size <= 6 && c.aggregation_size <= 3);
                prop_assert!(c.steps <= 4 && c.parallelism == 1);
            }
        }
    }
}

#[test]
fn test_sample_empty_population() {
    assert!(sample(0, 3, 7).is_empty());
}
