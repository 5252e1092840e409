//! Symmetric GCN normalisation.
//!
//! Computes per-edge weights for `Â = D^{-1/2} (A + I) D^{-1/2}`:
//!
//! ```text
//! w_ij = 1 / sqrt(d_i * d_j),   d_i = 1 + |{j : (j, i) in E}|
//! ```
//!
//! Weights are returned alongside the looped edge list so a layer can
//! aggregate with a gather / scatter-add instead of a dense `N x N` matrix.

use crate::{EdgeIndex, Graph};

/// Edge list with self-loops and the matching normalised weights.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEdges {
    pub edge_index: EdgeIndex,
    pub weights: Vec<f32>,
    pub num_nodes: usize,
}

/// In-degree of every node (count of edges pointing at it).
pub fn in_degrees(edges: &EdgeIndex, num_nodes: usize) -> Vec<f32> {
    let mut deg = vec![0.0f32; num_nodes];
    for &d in edges.dst() {
        deg[d as usize] += 1.0;
    }
    deg
}

/// Add one self-loop per node and compute symmetric normalisation weights.
pub fn gcn_norm(edges: &EdgeIndex, num_nodes: usize) -> NormalizedEdges {
    let looped = edges.with_self_loops(num_nodes);
    let deg = in_degrees(&looped, num_nodes);
    let inv_sqrt: Vec<f32> = deg
        .iter()
        .map(|&d| if d > 0.0 { d.sqrt().recip() } else { 0.0 })
        .collect();
    let weights = looped
        .iter()
        .map(|(s, d)| inv_sqrt[s as usize] * inv_sqrt[d as usize])
        .collect();
    NormalizedEdges {
        edge_index: looped,
        weights,
        num_nodes,
    }
}

impl Graph {
    /// GCN-normalised edges of this graph.
    pub fn gcn_norm(&self) -> NormalizedEdges {
        gcn_norm(self.edge_index(), self.num_nodes())
    }
}

/// Scale every row of a row-major matrix to sum to one. All-zero rows are
/// left as they are.
pub fn row_normalize(features: &mut [f32], num_features: usize) {
    if num_features == 0 {
        return;
    }
    for row in features.chunks_mut(num_features) {
        let sum: f32 = row.iter().sum();
        if sum != 0.0 {
            row.iter_mut().for_each(|v| *v /= sum);
        }
    }
}
