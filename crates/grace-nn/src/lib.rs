//! Contrastive graph representation learning (GRACE) on candle.
//!
//! `grace-nn` holds the trainable half of the workspace: the GCN layers,
//! the shared encoder and projection head, the InfoNCE objective, the
//! training loop and the linear-probe evaluation. Graph loading and
//! augmentation live in `grace-core`.
//!
//! # Modules
//!
//! - [`conv`]: Sparse GCN layer and graph-to-tensor conversion
//! - [`encoder`]: Multi-layer encoder and projection head
//! - [`loss`]: Symmetric temperature-scaled InfoNCE
//! - [`model`]: Encoder + head, seeded parameter initialisation
//! - [`training`]: Epoch loop, early stopping, checkpoints
//! - [`evaluation`]: Linear classifier on frozen embeddings
//!
//! # Example
//!
//! ```rust,ignore
//! use grace_core::{Dataset, NodeSplit, SplitStrategy};
//! use grace_nn::evaluation::{linear_probe, LinearProbeConfig};
//! use grace_nn::training::{GraceConfig, GraceTrainer};
//!
//! let graph = Dataset::Cora.load("datasets")?;
//! let mut trainer = GraceTrainer::new(GraceConfig::default(), graph.num_features(), &Device::Cpu)?;
//! trainer.train(&graph, None, |_| {})?;
//!
//! let labels = graph.require_labels()?;
//! let split = NodeSplit::new(SplitStrategy::default(), labels, graph.num_classes(), 42)?;
//! let metrics = linear_probe(&trainer.embed(&graph)?, labels, graph.num_classes(), &split, &LinearProbeConfig::default())?;
//! println!("Test acc: {:.4}", metrics.test_acc);
//! ```

pub mod conv;
pub mod encoder;
pub mod error;
pub mod evaluation;
pub mod loss;
pub mod model;
pub mod training;

pub use conv::{GCNConv, GraphTensors, NormalizedAdjacency};
pub use encoder::{Activation, Encoder, ProjectionHead};
pub use error::{Error, Result};
pub use evaluation::{linear_probe, LinearProbeConfig, ProbeMetrics};
pub use loss::contrastive_loss;
pub use model::{init_parameters, GraceModel, ModelDims};
pub use training::{EpochReport, GraceConfig, GraceTrainer, TrainingResult};
