//! Rank/unrank must be exact inverses over every permutation of a list, not
//! just the handful of fixed cases in the unit tests — the permutation coders
//! in `filters` rely on this holding for arbitrary header/attribute counts.

use permute::{fact, rank, unrank};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// For a sorted list of distinct byte strings and any rank `0 <= n <
    /// len!`, unranking then re-ranking recovers `n` exactly.
    #[test]
    fn rank_of_unrank_is_identity(len in 0usize..7, seed in any::<u64>()) {
        let mut items: Vec<u64> = (0..len as u64).collect();
        // Deterministic "shuffle" of the seed just to vary which sorted list
        // of distinct values we index into; rank/unrank only care about
        // relative order, so any strictly increasing sequence works as the
        // base list.
        for v in &mut items {
            *v = v.wrapping_mul(seed.wrapping_add(1)).wrapping_add(*v);
        }
        items.sort_unstable();
        items.dedup();
        let total = fact(items.len());
        if total == 0 {
            return Ok(());
        }
        let n = seed % total;
        let permuted = unrank(n, &items);
        prop_assert_eq!(rank(permuted), n);
    }

    /// Unranking every index `0..len!` for a small fixed-size list produces
    /// `len!` distinct permutations, i.e. unrank never collides two indices.
    #[test]
    fn unrank_is_injective_over_full_range(len in 0usize..6) {
        let items: Vec<u32> = (0..len as u32).collect();
        let total = fact(items.len());
        let mut seen = std::collections::HashSet::new();
        for x in 0..total {
            seen.insert(unrank(x, &items));
        }
        prop_assert_eq!(seen.len() as u64, total);
    }
}
