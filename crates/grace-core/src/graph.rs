use crate::{Error, Result};
use std::collections::BTreeSet;

/// Directed edge list stored as parallel source/target arrays.
///
/// Undirected graphs store both directions. Order is preserved by every
/// filtering operation so edge `k` of a derived list can be traced back to
/// the original.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeIndex {
    src: Vec<u32>,
    dst: Vec<u32>,
}

impl EdgeIndex {
    /// Create an empty edge list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an edge list with room for `edges` edges.
    pub fn with_capacity(edges: usize) -> Self {
        Self {
            src: Vec::with_capacity(edges),
            dst: Vec::with_capacity(edges),
        }
    }

    /// Build from `(source, target)` pairs.
    pub fn from_pairs<I: IntoIterator<Item = (u32, u32)>>(pairs: I) -> Self {
        let (src, dst) = pairs.into_iter().unzip();
        Self { src, dst }
    }

    /// Build from separate source and target arrays.
    pub fn from_parts(src: Vec<u32>, dst: Vec<u32>) -> Result<Self> {
        if src.len() != dst.len() {
            return Err(Error::Shape(format!(
                "edge index has {} sources but {} targets",
                src.len(),
                dst.len()
            )));
        }
        Ok(Self { src, dst })
    }

    pub fn push(&mut self, src: u32, dst: u32) {
        self.src.push(src);
        self.dst.push(dst);
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Source node of every edge.
    pub fn src(&self) -> &[u32] {
        &self.src
    }

    /// Target node of every edge.
    pub fn dst(&self) -> &[u32] {
        &self.dst
    }

    /// Iterate `(source, target)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }

    /// Largest node index referenced by any edge.
    pub fn max_node(&self) -> Option<u32> {
        self.src.iter().chain(self.dst.iter()).copied().max()
    }

    /// Symmetrise: store both directions of every edge exactly once, drop
    /// self-loops, and sort by `(source, target)`.
    pub fn to_undirected(&self) -> Self {
        let mut set = BTreeSet::new();
        for (s, d) in self.iter() {
            if s != d {
                set.insert((s, d));
                set.insert((d, s));
            }
        }
        Self::from_pairs(set)
    }

    /// Keep only the edges whose flag in `keep` is set.
    pub fn filter_by_mask(&self, keep: &[bool]) -> Self {
        debug_assert_eq!(keep.len(), self.len());
        let pairs = self
            .iter()
            .zip(keep.iter())
            .filter_map(|(edge, &k)| k.then_some(edge));
        Self::from_pairs(pairs)
    }

    /// Replace any existing self-loops with exactly one loop per node.
    ///
    /// Loops are appended after the original edges.
    pub fn with_self_loops(&self, num_nodes: usize) -> Self {
        let mut out = Self::with_capacity(self.len() + num_nodes);
        for (s, d) in self.iter().filter(|(s, d)| s != d) {
            out.push(s, d);
        }
        for i in 0..num_nodes as u32 {
            out.push(i, i);
        }
        out
    }
}

/// Summary statistics of a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_features: usize,
    pub num_classes: usize,
    /// Mean number of outgoing edges per node.
    pub avg_degree: f64,
    /// Nodes with no incident edge.
    pub isolated_nodes: usize,
}

/// An attributed graph: node features, edges and optional node labels.
///
/// Features are a dense row-major `num_nodes x num_features` matrix. A graph
/// is never mutated after construction; augmentation and normalisation build
/// new values.
///
/// # Example
///
/// ```rust
/// use grace_core::{EdgeIndex, Graph};
///
/// let edges = EdgeIndex::from_pairs([(0, 1), (1, 0), (1, 2), (2, 1)]);
/// let graph = Graph::new(vec![1.0; 3 * 4], 3, 4, edges)?;
///
/// assert_eq!(graph.num_nodes(), 3);
/// assert_eq!(graph.num_edges(), 4);
/// # Ok::<(), grace_core::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    features: Vec<f32>,
    num_nodes: usize,
    num_features: usize,
    edge_index: EdgeIndex,
    labels: Option<Vec<u32>>,
    num_classes: usize,
}

impl Graph {
    /// Create an unlabelled graph.
    ///
    /// Fails if `features` is not `num_nodes * num_features` long or an edge
    /// references a node outside `0..num_nodes`.
    pub fn new(
        features: Vec<f32>,
        num_nodes: usize,
        num_features: usize,
        edge_index: EdgeIndex,
    ) -> Result<Self> {
        if features.len() != num_nodes * num_features {
            return Err(Error::Shape(format!(
                "feature buffer has {} values, expected {} x {}",
                features.len(),
                num_nodes,
                num_features
            )));
        }
        if let Some(max) = edge_index.max_node() {
            if max as usize >= num_nodes {
                return Err(Error::Shape(format!(
                    "edge references node {} but graph has {} nodes",
                    max, num_nodes
                )));
            }
        }
        Ok(Self {
            features,
            num_nodes,
            num_features,
            edge_index,
            labels: None,
            num_classes: 0,
        })
    }

    /// Attach one class label per node.
    pub fn with_labels(mut self, labels: Vec<u32>, num_classes: usize) -> Result<Self> {
        if labels.len() != self.num_nodes {
            return Err(Error::Shape(format!(
                "{} labels for {} nodes",
                labels.len(),
                self.num_nodes
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&y| y as usize >= num_classes) {
            return Err(Error::Shape(format!(
                "label {} out of range for {} classes",
                bad, num_classes
            )));
        }
        self.labels = Some(labels);
        self.num_classes = num_classes;
        Ok(self)
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }

    /// Number of label classes (0 when unlabelled).
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Row-major feature matrix.
    pub fn features(&self) -> &[f32] {
        &self.features
    }

    /// Feature vector of node `node`.
    pub fn feature_row(&self, node: usize) -> &[f32] {
        let start = node * self.num_features;
        &self.features[start..start + self.num_features]
    }

    pub fn edge_index(&self) -> &EdgeIndex {
        &self.edge_index
    }

    pub fn labels(&self) -> Option<&[u32]> {
        self.labels.as_deref()
    }

    /// Labels, or [`Error::MissingLabels`].
    pub fn require_labels(&self) -> Result<&[u32]> {
        self.labels().ok_or(Error::MissingLabels)
    }

    /// Same nodes and labels, new edges and features.
    pub(crate) fn with_parts(&self, edge_index: EdgeIndex, features: Vec<f32>) -> Self {
        debug_assert_eq!(features.len(), self.features.len());
        Self {
            features,
            num_nodes: self.num_nodes,
            num_features: self.num_features,
            edge_index,
            labels: self.labels.clone(),
            num_classes: self.num_classes,
        }
    }

    /// Same nodes, edges and labels, different features.
    pub(crate) fn with_features(&self, features: Vec<f32>) -> Self {
        self.with_parts(self.edge_index.clone(), features)
    }

    pub fn stats(&self) -> GraphStats {
        let mut touched = vec![false; self.num_nodes];
        for (s, d) in self.edge_index.iter() {
            touched[s as usize] = true;
            touched[d as usize] = true;
        }
        GraphStats {
            num_nodes: self.num_nodes,
            num_edges: self.num_edges(),
            num_features: self.num_features,
            num_classes: self.num_classes,
            avg_degree: if self.num_nodes == 0 {
                0.0
            } else {
                self.num_edges() as f64 / self.num_nodes as f64
            },
            isolated_nodes: touched.iter().filter(|&&t| !t).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_rejects_bad_feature_length() {
        let err = Graph::new(vec![0.0; 5], 2, 3, EdgeIndex::new()).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_graph_rejects_out_of_range_edge() {
        let edges = EdgeIndex::from_pairs([(0, 3)]);
        assert!(Graph::new(vec![0.0; 6], 3, 2, edges).is_err());
    }

    #[test]
    fn test_labels_checked_against_classes() {
        let g = Graph::new(vec![0.0; 4], 2, 2, EdgeIndex::new()).unwrap();
        assert!(g.clone().with_labels(vec![0, 2], 2).is_err());
        let g = g.with_labels(vec![0, 1], 2).unwrap();
        assert_eq!(g.labels(), Some(&[0u32, 1][..]));
        assert_eq!(g.num_classes(), 2);
    }

    #[test]
    fn test_to_undirected_dedups_and_drops_loops() {
        let edges = EdgeIndex::from_pairs([(0, 1), (1, 0), (2, 2), (1, 2), (0, 1)]);
        let und = edges.to_undirected();
        let pairs: Vec<_> = und.iter().collect();
        assert_eq!(pairs, vec![(0, 1), (1, 0), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_with_self_loops_replaces_existing() {
        let edges = EdgeIndex::from_pairs([(0, 0), (0, 1)]);
        let looped = edges.with_self_loops(2);
        let pairs: Vec<_> = looped.iter().collect();
        assert_eq!(pairs, vec![(0, 1), (0, 0), (1, 1)]);
    }

    #[test]
    fn test_stats() {
        let edges = EdgeIndex::from_pairs([(0, 1), (1, 0)]);
        let g = Graph::new(vec![0.0; 3], 3, 1, edges).unwrap();
        let stats = g.stats();
        assert_eq!(stats.num_edges, 2);
        assert_eq!(stats.isolated_nodes, 1);
        assert!((stats.avg_degree - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_with_parts_keeps_nodes_and_labels() {
        let edges = EdgeIndex::from_pairs([(0, 1), (1, 0), (1, 2), (2, 1)]);
        let g = Graph::new(vec![1.0; 6], 3, 2, edges)
            .unwrap()
            .with_labels(vec![0, 1, 1], 2)
            .unwrap();
        let view = g.with_parts(EdgeIndex::from_pairs([(1, 2), (2, 1)]), vec![2.0; 6]);
        assert_eq!(view.num_nodes(), 3);
        assert_eq!(view.num_features(), 2);
        assert_eq!(view.num_edges(), 2);
        assert_eq!(view.labels(), g.labels());
        assert_eq!(view.num_classes(), 2);
        assert_eq!(view.feature_row(2), &[2.0, 2.0]);
        // source graph untouched
        assert_eq!(g.num_edges(), 4);
        assert_eq!(g.feature_row(2), &[1.0, 1.0]);
    }
}
