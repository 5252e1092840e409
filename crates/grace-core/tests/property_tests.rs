//! Property-based tests for graph augmentation and normalisation.
//!
//! These tests verify invariants that should hold for any graph:
//! - Views keep every node, in order, with their labels
//! - Dropped edges are a subset of the original edges
//! - Feature masking zeroes whole columns only
//! - GCN weights are symmetric on undirected graphs

use grace_core::augment::{augment, AugmentConfig};
use grace_core::{EdgeIndex, Graph};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};

/// Random labelled graph with 1..40 nodes and 1..12 features.
fn arb_graph() -> impl Strategy<Value = Graph> {
    (1usize..40, 1usize..12).prop_flat_map(|(n, f)| {
        let edges = prop::collection::vec((0..n as u32, 0..n as u32), 0..120);
        let features = prop::collection::vec(0.1f32..10.0, n * f);
        let labels = prop::collection::vec(0u32..3, n);
        (edges, features, labels).prop_map(move |(edges, features, labels)| {
            let edges = EdgeIndex::from_pairs(edges).to_undirected();
            Graph::new(features, n, f, edges)
                .and_then(|g| g.with_labels(labels, 3))
                .unwrap()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn augmentation_preserves_nodes(
        graph in arb_graph(),
        pe in 0.0f32..=1.0,
        pf in 0.0f32..=1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let view = augment(&graph, &AugmentConfig::new(pe, pf), &mut rng).unwrap();

        prop_assert_eq!(view.num_nodes(), graph.num_nodes());
        prop_assert_eq!(view.num_features(), graph.num_features());
        prop_assert_eq!(view.labels(), graph.labels());

        // Every surviving value is the original value of the same node.
        for node in 0..graph.num_nodes() {
            for (v, o) in view.feature_row(node).iter().zip(graph.feature_row(node)) {
                prop_assert!(*v == 0.0 || v == o);
            }
        }
    }

    #[test]
    fn dropped_edges_are_a_subset(
        graph in arb_graph(),
        pe in 0.0f32..=1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let view = augment(&graph, &AugmentConfig::new(pe, 0.0), &mut rng).unwrap();
        let original: HashSet<_> = graph.edge_index().iter().collect();

        prop_assert!(view.num_edges() <= graph.num_edges());
        for edge in view.edge_index().iter() {
            prop_assert!(original.contains(&edge));
        }
        prop_assert_eq!(view.features(), graph.features());
    }

    #[test]
    fn feature_mask_drops_whole_columns(
        graph in arb_graph(),
        pf in 0.0f32..=1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let view = augment(&graph, &AugmentConfig::new(0.0, pf), &mut rng).unwrap();
        // Original features are strictly positive, so a zero means masked.
        for col in 0..graph.num_features() {
            let zeros = (0..graph.num_nodes())
                .filter(|&n| view.feature_row(n)[col] == 0.0)
                .count();
            prop_assert!(zeros == 0 || zeros == graph.num_nodes());
        }
        prop_assert_eq!(view.edge_index(), graph.edge_index());
    }

    #[test]
    fn rates_outside_unit_interval_fail(rate in prop_oneof![-10.0f32..-0.001, 1.001f32..10.0]) {
        let graph = Graph::new(vec![1.0; 4], 2, 2, EdgeIndex::new()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        prop_assert!(augment(&graph, &AugmentConfig::new(rate, 0.0), &mut rng).is_err());
        prop_assert!(augment(&graph, &AugmentConfig::new(0.0, rate), &mut rng).is_err());
    }

    #[test]
    fn gcn_weights_symmetric(graph in arb_graph()) {
        let norm = graph.gcn_norm();
        prop_assert_eq!(norm.edge_index.len(), graph.num_edges() + graph.num_nodes());
        let w: HashMap<(u32, u32), f32> = norm
            .edge_index
            .iter()
            .zip(norm.weights.iter().copied())
            .collect();
        for (&(s, d), &weight) in &w {
            prop_assert!(weight > 0.0 && weight <= 1.0);
            prop_assert!((weight - w[&(d, s)]).abs() < 1e-6);
        }
    }
}
