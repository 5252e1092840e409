// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::uninlined_format_args)]

//! Graph data for contrastive node representation learning.
//!
//! This crate holds everything that happens before tensors are involved:
//!
//! - [`Graph`] - node features, edges and labels, immutable once built
//! - [`datasets`] - Cora / CiteSeer / PubMed loaders for the raw citation files
//! - [`augment`] - edge dropping and feature masking to create views
//! - [`norm`] - self-loops and symmetric GCN edge weights
//! - [`split`] - train / validation / test node splits for evaluation
//!
//! # Example
//!
//! ```rust
//! use grace_core::augment::{augment, AugmentConfig};
//! use grace_core::{EdgeIndex, Graph};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let edges = EdgeIndex::from_pairs([(0, 1), (1, 2)]).to_undirected();
//! let graph = Graph::new(vec![1.0; 3 * 8], 3, 8, edges)?;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let view = augment(&graph, &AugmentConfig::new(0.2, 0.3), &mut rng)?;
//!
//! // Views never add, drop or reorder nodes.
//! assert_eq!(view.num_nodes(), graph.num_nodes());
//! # Ok::<(), grace_core::Error>(())
//! ```

pub mod augment;
pub mod datasets;
mod error;
mod graph;
pub mod norm;
pub mod split;

pub use augment::AugmentConfig;
pub use datasets::Dataset;
pub use error::{Error, Result};
pub use graph::{EdgeIndex, Graph, GraphStats};
pub use norm::NormalizedEdges;
pub use split::{NodeSplit, SplitStrategy};
