//! Message-passing graph convolution.
//!
//! [`GCNConv`] implements the Kipf & Welling propagation rule
//!
//! ```text
//! H' = D^{-1/2} (A + I) D^{-1/2} H W + b
//! ```
//!
//! as a gather / weighted scatter-add over the normalised edge list held in
//! [`NormalizedAdjacency`]:
//!
//! 1. **Message**: `m_e = w_e * (H W)[src_e]`
//! 2. **Aggregate**: `H'[i] = sum_{e : dst_e = i} m_e`
//! 3. **Update**: add the bias
//!
//! Memory is `O(|E| * d)`; no `N x N` matrix is ever built, so PubMed-sized
//! graphs fit comfortably.

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{linear_no_bias, Init, Linear, Module, VarBuilder};
use grace_core::{Graph, NormalizedEdges};

/// GCN-normalised edge list on a device.
#[derive(Debug, Clone)]
pub struct NormalizedAdjacency {
    src: Tensor,
    dst: Tensor,
    /// Edge weights as an `(E, 1)` column so they broadcast over features.
    weight: Tensor,
    num_nodes: usize,
}

impl NormalizedAdjacency {
    pub fn new(norm: &NormalizedEdges, device: &Device) -> Result<Self> {
        let e = norm.edge_index.len();
        Ok(Self {
            src: Tensor::from_slice(norm.edge_index.src(), e, device)?,
            dst: Tensor::from_slice(norm.edge_index.dst(), e, device)?,
            weight: Tensor::from_slice(&norm.weights, (e, 1), device)?,
            num_nodes: norm.num_nodes,
        })
    }

    /// Add self-loops to the graph's edges and normalise.
    pub fn from_graph(graph: &Graph, device: &Device) -> Result<Self> {
        Self::new(&graph.gcn_norm(), device)
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of edges including self-loops.
    pub fn num_edges(&self) -> usize {
        self.src.elem_count()
    }

    /// `Â · h` for node features `h` of shape `(N, d)`.
    pub fn propagate(&self, h: &Tensor) -> Result<Tensor> {
        let (n, d) = h.dims2()?;
        if n != self.num_nodes {
            candle_core::bail!("propagate: {} feature rows for {} nodes", n, self.num_nodes);
        }
        let messages = h.index_select(&self.src, 0)?.broadcast_mul(&self.weight)?;
        Tensor::zeros((n, d), h.dtype(), h.device())?.index_add(&self.dst, &messages, 0)
    }

    /// Dense `(N, N)` matrix `Â`, with `Â[dst, src] = w`.
    #[cfg(test)]
    pub(crate) fn to_dense(&self) -> Result<Tensor> {
        let n = self.num_nodes;
        let src = self.src.to_vec1::<u32>()?;
        let dst = self.dst.to_vec1::<u32>()?;
        let w = self.weight.flatten_all()?.to_vec1::<f32>()?;
        let mut dense = vec![0f32; n * n];
        for ((s, d), w) in src.iter().zip(dst.iter()).zip(w.iter()) {
            dense[*d as usize * n + *s as usize] += w;
        }
        Tensor::from_vec(dense, (n, n), self.src.device())
    }
}

/// Node features and normalised structure of one graph (or view), on a device.
#[derive(Debug, Clone)]
pub struct GraphTensors {
    /// Node features `(N, F)`.
    pub x: Tensor,
    pub adj: NormalizedAdjacency,
}

impl GraphTensors {
    pub fn new(graph: &Graph, device: &Device) -> Result<Self> {
        let x = Tensor::from_slice(
            graph.features(),
            (graph.num_nodes(), graph.num_features()),
            device,
        )?
        .to_dtype(DType::F32)?;
        let adj = NormalizedAdjacency::from_graph(graph, device)?;
        Ok(Self { x, adj })
    }
}

/// Graph Convolutional Network layer.
///
/// Implements: H' = D^{-1/2} A D^{-1/2} H W + b
///
/// Where:
/// - A is the adjacency matrix (with self-loops)
/// - D is the degree matrix
/// - H is the node feature matrix
/// - W is the learnable weight matrix
///
/// # Reference
///
/// Kipf & Welling, "Semi-Supervised Classification with Graph Convolutional
/// Networks", ICLR 2017.
pub struct GCNConv {
    linear: Linear,
    bias: Option<Tensor>,
}

impl GCNConv {
    /// Create a new GCN layer.
    ///
    /// # Arguments
    /// - `in_features`: Input feature dimension
    /// - `out_features`: Output feature dimension
    /// - `bias`: Whether to add a bias after aggregation
    /// - `vb`: Variable builder for parameter initialization
    pub fn new(in_features: usize, out_features: usize, bias: bool, vb: VarBuilder) -> Result<Self> {
        let linear = linear_no_bias(in_features, out_features, vb.pp("lin"))?;
        let bias = if bias {
            Some(vb.get_with_hints(out_features, "bias", Init::Const(0.0))?)
        } else {
            None
        };
        Ok(Self { linear, bias })
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// - `x`: Node features (N x in_features)
    /// - `adj`: Normalized adjacency with self-loops
    ///
    /// # Returns
    /// - Node embeddings (N x out_features)
    pub fn forward(&self, x: &Tensor, adj: &NormalizedAdjacency) -> Result<Tensor> {
        // Linear transform first: aggregation then runs at out_features width
        let h = self.linear.forward(x)?;
        let out = adj.propagate(&h)?;
        match &self.bias {
            Some(b) => out.broadcast_add(b),
            None => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;
    use grace_core::EdgeIndex;

    fn triangle_plus_leaf() -> Graph {
        let edges = EdgeIndex::from_pairs([(0, 1), (1, 2), (2, 0), (2, 3)]).to_undirected();
        let features = (0..4 * 5).map(|v| (v % 7) as f32 * 0.1).collect();
        Graph::new(features, 4, 5, edges).unwrap()
    }

    #[test]
    fn test_gcn_forward_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let gcn = GCNConv::new(5, 3, true, vb).unwrap();
        let t = GraphTensors::new(&triangle_plus_leaf(), &device).unwrap();

        let out = gcn.forward(&t.x, &t.adj).unwrap();
        assert_eq!(out.dims(), &[4, 3]);
    }

    #[test]
    fn test_sparse_propagation_matches_dense() {
        let device = Device::Cpu;
        let t = GraphTensors::new(&triangle_plus_leaf(), &device).unwrap();

        let sparse = t.adj.propagate(&t.x).unwrap().to_vec2::<f32>().unwrap();
        let dense = t.adj.to_dense().unwrap().matmul(&t.x).unwrap().to_vec2::<f32>().unwrap();

        for (a, b) in sparse.iter().flatten().zip(dense.iter().flatten()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_isolated_nodes_keep_their_features() {
        let device = Device::Cpu;
        let g = Graph::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2, EdgeIndex::new()).unwrap();
        let t = GraphTensors::new(&g, &device).unwrap();
        assert_eq!(t.adj.num_edges(), 2);
        let out = t.adj.propagate(&t.x).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(out, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_propagate_rejects_wrong_row_count() {
        let device = Device::Cpu;
        let t = GraphTensors::new(&triangle_plus_leaf(), &device).unwrap();
        let h = Tensor::zeros((3, 5), DType::F32, &device).unwrap();
        assert!(t.adj.propagate(&h).is_err());
    }
}
