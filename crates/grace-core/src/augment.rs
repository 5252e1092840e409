//! Stochastic graph augmentation for contrastive training.
//!
//! Two corruptions are combined to produce a view of a graph:
//!
//! - [`drop_edges`] - remove each edge independently with probability `p_e`
//! - [`mask_features`] - zero whole feature columns, each with probability `p_f`
//!
//! ```text
//!  G = (X, A)  --drop_edges(p_e1), mask_features(p_f1)-->  view 1
//!              --drop_edges(p_e2), mask_features(p_f2)-->  view 2
//! ```
//!
//! The column mask is drawn once per view and shared by every node, so a view
//! hides the same attributes everywhere. Nodes are never removed or
//! reordered: row `i` of a view is node `i` of the source graph.

use crate::{EdgeIndex, Error, Graph, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Corruption rates for one augmented view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Probability of removing an edge.
    pub drop_edge_rate: f32,
    /// Probability of zeroing a feature dimension.
    pub drop_feature_rate: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            drop_edge_rate: 0.2,
            drop_feature_rate: 0.3,
        }
    }
}

impl AugmentConfig {
    pub fn new(drop_edge_rate: f32, drop_feature_rate: f32) -> Self {
        Self {
            drop_edge_rate,
            drop_feature_rate,
        }
    }

    /// No corruption at all: the view equals the input graph.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        check_rate("drop_edge_rate", self.drop_edge_rate)?;
        check_rate("drop_feature_rate", self.drop_feature_rate)
    }
}

/// Fail unless `value` is a probability.
pub fn check_rate(name: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidRate { name, value })
    }
}

/// Keep each edge independently with probability `1 - rate`.
///
/// Surviving edges keep their relative order.
pub fn drop_edges<R: Rng + ?Sized>(edges: &EdgeIndex, rate: f32, rng: &mut R) -> Result<EdgeIndex> {
    check_rate("drop_edge_rate", rate)?;
    if rate == 0.0 {
        return Ok(edges.clone());
    }
    let keep_prob = f64::from(1.0 - rate);
    let keep: Vec<bool> = (0..edges.len()).map(|_| rng.random_bool(keep_prob)).collect();
    Ok(edges.filter_by_mask(&keep))
}

/// Draw a column mask: `true` marks a feature dimension to zero.
pub fn feature_mask<R: Rng + ?Sized>(num_features: usize, rate: f32, rng: &mut R) -> Result<Vec<bool>> {
    check_rate("drop_feature_rate", rate)?;
    if rate == 0.0 {
        return Ok(vec![false; num_features]);
    }
    let p = f64::from(rate);
    Ok((0..num_features).map(|_| rng.random_bool(p)).collect())
}

/// Copy of the feature matrix with a random subset of columns zeroed.
pub fn mask_features<R: Rng + ?Sized>(graph: &Graph, rate: f32, rng: &mut R) -> Result<Vec<f32>> {
    let mask = feature_mask(graph.num_features(), rate, rng)?;
    let mut features = graph.features().to_vec();
    if mask.iter().any(|&m| m) {
        for row in features.chunks_mut(graph.num_features().max(1)) {
            for (value, &dropped) in row.iter_mut().zip(mask.iter()) {
                if dropped {
                    *value = 0.0;
                }
            }
        }
    }
    Ok(features)
}

/// Produce one augmented view of `graph`. The input is left untouched.
pub fn augment<R: Rng + ?Sized>(graph: &Graph, config: &AugmentConfig, rng: &mut R) -> Result<Graph> {
    config.validate()?;
    let edges = drop_edges(graph.edge_index(), config.drop_edge_rate, rng)?;
    let features = mask_features(graph, config.drop_feature_rate, rng)?;
    Ok(graph.with_parts(edges, features))
}
