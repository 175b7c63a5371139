//! Property-based tests for sampling invariants.
//!
//! - Negatives never come from the true set
//! - Successful draws have exactly k distinct entities
//! - Failure happens exactly when the filtered pool is smaller than k
//! - True-fact tables cover every triplet

use keprep_core::{draw_negatives, EntityId, Triplet, TrueFacts};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use std::collections::{BTreeSet, HashSet};

fn arb_pool() -> impl Strategy<Value = (Vec<EntityId>, HashSet<EntityId>)> {
    (
        prop::collection::btree_set(0usize..200, 0..60),
        prop::collection::hash_set(0usize..200, 0..60),
    )
        .prop_map(|(candidates, known): (BTreeSet<EntityId>, HashSet<EntityId>)| {
            (candidates.into_iter().collect(), known)
        })
}

fn arb_triplet() -> impl Strategy<Value = Triplet> {
    (0usize..30, 0i64..5, 0usize..30).prop_map(|(h, r, t)| Triplet::new(h, r, t))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn negatives_avoid_true_set(
        (candidates, known) in arb_pool(),
        k in 1usize..8,
        seed in any::<u64>(),
    ) {
        let mut rng = XorShiftRng::seed_from_u64(seed);
        let eligible = candidates.iter().filter(|e| !known.contains(e)).count();

        match draw_negatives(&candidates, Some(&known), k, &mut rng) {
            Some(drawn) => {
                prop_assert!(eligible >= k);
                prop_assert_eq!(drawn.len(), k);
                let distinct: HashSet<_> = drawn.iter().collect();
                prop_assert_eq!(distinct.len(), k);
                for e in &drawn {
                    prop_assert!(!known.contains(e), "drew true entity {}", e);
                    prop_assert!(candidates.contains(e));
                }
            }
            None => prop_assert!(eligible < k),
        }
    }

    #[test]
    fn same_seed_same_draw(
        (candidates, known) in arb_pool(),
        k in 1usize..5,
        seed in any::<u64>(),
    ) {
        let a = draw_negatives(&candidates, Some(&known), k, &mut XorShiftRng::seed_from_u64(seed));
        let b = draw_negatives(&candidates, Some(&known), k, &mut XorShiftRng::seed_from_u64(seed));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn true_facts_cover_all_triplets(triplets in prop::collection::vec(arb_triplet(), 0..100)) {
        let facts = TrueFacts::from_triplets(&triplets);
        for t in &triplets {
            prop_assert!(facts.true_tails(t.head, t.relation).is_some_and(|s| s.contains(&t.tail)));
            prop_assert!(facts.true_heads(t.relation, t.tail).is_some_and(|s| s.contains(&t.head)));
            prop_assert!(facts.contains(t));
        }
    }
}
