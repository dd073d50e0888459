//! Property-Based Tests for pool partitioning and graph validation
//!
//! Invariants:
//! - Disjointness: interleaved allocations never place a question in two pools
//! - Exhaustion: allocation keeps succeeding until the bank is empty
//! - Validator: generated forward-only DAGs are accepted, a back edge closing
//!   a loop is rejected

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use noobular_algo::{validate_prerequisite_graph, GraphError, PoolKind, PoolLedger};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_pool_kind() -> impl Strategy<Value = PoolKind> {
    prop_oneof![
        Just(PoolKind::Lesson),
        Just(PoolKind::Quiz),
        Just(PoolKind::Review),
        Just(PoolKind::Diagnostic),
    ]
}

/// Bank sizes for up to five KPs; KP `k` owns questions `k*100..k*100+size`.
fn arb_banks() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..12, 1..5)
}

/// Each node may only depend on earlier nodes, so the result is a DAG whose
/// first node is a root.
fn arb_dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..25).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                if i == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    prop::collection::vec(0..i, 0..3).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

fn names(dag: &[Vec<usize>]) -> Vec<(String, Vec<String>)> {
    dag.iter()
        .enumerate()
        .map(|(i, prereqs)| {
            (format!("kp{i}"), prereqs.iter().map(|p| format!("kp{p}")).collect())
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn interleaved_allocations_stay_disjoint(
        banks in arb_banks(),
        calls in prop::collection::vec((0usize..5, arb_pool_kind()), 0..80),
        seed in any::<u64>(),
    ) {
        let mut ledger = PoolLedger::new();
        for (kp, size) in banks.iter().enumerate() {
            let kp = kp as i64;
            ledger = ledger.with_bank(kp, (0..*size as i64).map(|q| kp * 100 + q).collect());
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut assigned: HashMap<i64, PoolKind> = HashMap::new();
        let mut per_kp: HashMap<i64, usize> = HashMap::new();

        for (kp, kind) in calls {
            let kp = kp as i64;
            let before = ledger.unassigned(kp).len();
            match ledger.allocate_with(kp, kind, &mut rng) {
                Some(q) => {
                    prop_assert_eq!(q / 100, kp);
                    prop_assert!(assigned.insert(q, kind).is_none(), "question {} assigned twice", q);
                    *per_kp.entry(kp).or_default() += 1;
                    prop_assert_eq!(ledger.unassigned(kp).len(), before - 1);
                }
                None => prop_assert_eq!(before, 0),
            }
        }

        for (kp, size) in banks.iter().enumerate() {
            let kp = kp as i64;
            let mut seen = HashSet::new();
            for kind in PoolKind::ALL {
                for q in ledger.questions_in(kp, kind) {
                    prop_assert!(seen.insert(q));
                    prop_assert_eq!(assigned.get(&q), Some(&kind));
                }
            }
            prop_assert_eq!(seen.len(), per_kp.get(&kp).copied().unwrap_or(0));
            prop_assert!(seen.len() <= *size);
        }
    }

    #[test]
    fn forward_only_graphs_are_accepted(dag in arb_dag()) {
        let nodes = names(&dag);
        let result = validate_prerequisite_graph(
            nodes.iter().map(|(n, p)| (n.as_str(), p.as_slice())),
        );
        prop_assert_eq!(result, Ok(()));
    }

    #[test]
    fn back_edge_is_rejected(dag in arb_dag(), pick in any::<prop::sample::Index>()) {
        prop_assume!(dag.len() >= 2);
        let mut dag = dag;
        // `from` and the last node become prerequisites of each other.
        let last = dag.len() - 1;
        let from = pick.index(last);
        dag[last].push(from);
        dag[from].push(last);

        let nodes = names(&dag);
        let result = validate_prerequisite_graph(
            nodes.iter().map(|(n, p)| (n.as_str(), p.as_slice())),
        );
        let rejected = matches!(
            result,
            Err(GraphError::Cycle { .. }) | Err(GraphError::Unreachable { .. })
        );
        prop_assert!(rejected, "expected rejection, got {:?}", result);
    }
}
