//! Contrastive training loop.
//!
//! Each epoch:
//! 1. Draw two augmented views of the graph with independent corruption rates
//! 2. Encode and project both through the shared model
//! 3. Compute the symmetric InfoNCE loss (plus the L2 penalty)
//! 4. Backpropagate and take one Adam step
//! 5. Checkpoint the parameters whenever the loss reaches a new minimum
//!
//! Training ends after `epochs` epochs, or earlier once `patience`
//! consecutive epochs fail to improve on the best loss. The best checkpoint
//! is reloaded before the trainer hands out embeddings.
//!
//! # Example
//!
//! ```rust,ignore
//! use grace_nn::training::{GraceConfig, GraceTrainer};
//!
//! let config = GraceConfig::default()
//!     .with_epochs(200)
//!     .with_learning_rate(5e-4)
//!     .with_temperature(0.4);
//!
//! let mut trainer = GraceTrainer::new(config, graph.num_features(), &Device::Cpu)?;
//! let result = trainer.train(&graph, Some(Path::new("model/GRACE.safetensors")), |_| {})?;
//! let embeddings = trainer.embed(&graph)?;
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use grace_core::augment::augment;
use grace_core::{AugmentConfig, Graph};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::conv::GraphTensors;
use crate::encoder::Activation;
use crate::error::{Error, Result};
use crate::model::{init_parameters, GraceModel, ModelDims};

/// File name of the best checkpoint inside a model directory.
pub const CHECKPOINT_FILE: &str = "GRACE.safetensors";

/// Checkpoint location inside `dir`.
pub fn checkpoint_path(dir: &Path) -> PathBuf {
    dir.join(CHECKPOINT_FILE)
}

/// Training configuration.
///
/// Defaults are the Cora settings of the GRACE paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraceConfig {
    /// Hidden width of the encoder's inner layers (default: 128).
    pub hid_dim: usize,
    /// Embedding width (default: 128).
    pub out_dim: usize,
    /// Number of GCN layers (default: 2).
    pub num_layers: usize,
    /// Encoder non-linearity (default: ReLU).
    pub activation: Activation,
    /// Adam learning rate (default: 5e-4).
    pub learning_rate: f64,
    /// L2 penalty coefficient (default: 1e-5).
    pub l2: f64,
    /// Number of training epochs (default: 200).
    pub epochs: usize,
    /// InfoNCE temperature (default: 0.4).
    pub temperature: f64,
    /// Corruption of the first view (default: 0.2 edges, 0.3 features).
    pub view1: AugmentConfig,
    /// Corruption of the second view (default: 0.4 edges, 0.4 features).
    pub view2: AugmentConfig,
    /// Row block size for the loss (None = all rows at once).
    pub loss_batch_size: Option<usize>,
    /// Early stopping patience (None = run every epoch).
    pub patience: Option<usize>,
    /// Seed for initialisation and augmentation (default: 42).
    pub seed: u64,
}

impl Default for GraceConfig {
    fn default() -> Self {
        Self {
            hid_dim: 128,
            out_dim: 128,
            num_layers: 2,
            activation: Activation::Relu,
            learning_rate: 5e-4,
            l2: 1e-5,
            epochs: 200,
            temperature: 0.4,
            view1: AugmentConfig::new(0.2, 0.3),
            view2: AugmentConfig::new(0.4, 0.4),
            loss_batch_size: None,
            patience: None,
            seed: 42,
        }
    }
}

impl GraceConfig {
    pub fn with_hid_dim(mut self, dim: usize) -> Self {
        self.hid_dim = dim;
        self
    }

    pub fn with_out_dim(mut self, dim: usize) -> Self {
        self.out_dim = dim;
        self
    }

    pub fn with_num_layers(mut self, n: usize) -> Self {
        self.num_layers = n;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_temperature(mut self, tau: f64) -> Self {
        self.temperature = tau;
        self
    }

    pub fn with_views(mut self, view1: AugmentConfig, view2: AugmentConfig) -> Self {
        self.view1 = view1;
        self.view2 = view2;
        self
    }

    pub fn with_loss_batch_size(mut self, batch: Option<usize>) -> Self {
        self.loss_batch_size = batch;
        self
    }

    pub fn with_patience(mut self, patience: Option<usize>) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject configurations that cannot train.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.hid_dim == 0 || self.out_dim == 0 {
            return invalid(format!("zero-width layer ({} hidden, {} out)", self.hid_dim, self.out_dim));
        }
        if self.num_layers == 0 {
            return invalid("num_layers must be at least 1".into());
        }
        if self.epochs == 0 {
            return invalid("epochs must be at least 1".into());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!("learning rate must be positive, got {}", self.learning_rate));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return invalid(format!("l2 must be non-negative, got {}", self.l2));
        }
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return invalid(format!("temperature must be positive, got {}", self.temperature));
        }
        if self.loss_batch_size == Some(0) {
            return invalid("loss batch size must be at least 1".into());
        }
        if self.patience == Some(0) {
            return invalid("patience must be at least 1".into());
        }
        self.view1.validate()?;
        self.view2.validate()?;
        Ok(())
    }

    fn dims(&self, in_dim: usize) -> ModelDims {
        ModelDims {
            in_dim,
            hid_dim: self.hid_dim,
            out_dim: self.out_dim,
            num_layers: self.num_layers,
            activation: self.activation,
        }
    }
}

/// JSON sidecar written next to every checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub in_dim: usize,
    pub config: GraceConfig,
}

/// Per-epoch progress.
#[derive(Debug, Clone, Copy)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Contrastive loss of this epoch (without the L2 penalty).
    pub loss: f32,
    pub best_loss: f32,
    /// Whether this epoch set a new best (and was checkpointed).
    pub improved: bool,
}

/// Training results.
#[derive(Debug, Clone)]
pub struct TrainingResult {
    /// Contrastive loss per epoch.
    pub loss_history: Vec<f32>,
    /// 1-based epoch with the lowest loss.
    pub best_epoch: usize,
    pub best_loss: f32,
    /// Whether patience ran out before `epochs`.
    pub stopped_early: bool,
}

/// Owns the model parameters and trains them.
pub struct GraceTrainer {
    config: GraceConfig,
    in_dim: usize,
    device: Device,
    varmap: VarMap,
    model: GraceModel,
}

impl GraceTrainer {
    /// Build a freshly initialised model for graphs with `in_dim` features.
    pub fn new(config: GraceConfig, in_dim: usize, device: &Device) -> Result<Self> {
        config.validate()?;
        if in_dim == 0 {
            return Err(Error::InvalidConfig("graph has no node features".into()));
        }
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = GraceModel::new(config.dims(in_dim), vb)?;
        init_parameters(&varmap, config.seed)?;
        Ok(Self {
            config,
            in_dim,
            device: device.clone(),
            varmap,
            model,
        })
    }

    /// Rebuild a trainer from a checkpoint and its JSON sidecar.
    pub fn from_checkpoint(path: &Path, device: &Device) -> Result<Self> {
        let reader = BufReader::new(File::open(path.with_extension("json"))?);
        let meta: CheckpointMeta = serde_json::from_reader(reader)?;
        let mut trainer = Self::new(meta.config, meta.in_dim, device)?;
        trainer.load(path)?;
        Ok(trainer)
    }

    pub fn config(&self) -> &GraceConfig {
        &self.config
    }

    /// Write all parameters to `path` and the config sidecar next to it.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        self.varmap.save(path)?;
        let meta = CheckpointMeta {
            in_dim: self.in_dim,
            config: self.config.clone(),
        };
        let writer = BufWriter::new(File::create(path.with_extension("json"))?);
        serde_json::to_writer_pretty(writer, &meta)?;
        Ok(())
    }

    /// Overwrite the parameters with those stored at `path`.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path)?;
        Ok(())
    }

    /// Train on `graph`, checkpointing the best epoch to `checkpoint`.
    ///
    /// `on_epoch` is called once per epoch after the optimizer step.
    pub fn train<F>(&mut self, graph: &Graph, checkpoint: Option<&Path>, mut on_epoch: F) -> Result<TrainingResult>
    where
        F: FnMut(&EpochReport),
    {
        if graph.num_features() != self.in_dim {
            return Err(Error::DimensionMismatch {
                expected: self.in_dim,
                got: graph.num_features(),
            });
        }
        let cfg = self.config.clone();
        tracing::info!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            epochs = cfg.epochs,
            lr = cfg.learning_rate,
            tau = cfg.temperature,
            "starting contrastive training"
        );

        let params = ParamsAdamW {
            lr: cfg.learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        };
        let vars = self.varmap.all_vars();
        let mut optimizer = AdamW::new(vars.clone(), params)?;
        // Views use their own stream so initialisation and augmentation stay independent
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed.wrapping_add(1));

        let mut loss_history = Vec::with_capacity(cfg.epochs);
        let mut best_loss = f32::INFINITY;
        let mut best_epoch = 0;
        let mut saved = false;
        let mut stopped_early = false;

        for epoch in 1..=cfg.epochs {
            let view1 = GraphTensors::new(&augment(graph, &cfg.view1, &mut rng)?, &self.device)?;
            let view2 = GraphTensors::new(&augment(graph, &cfg.view2, &mut rng)?, &self.device)?;

            let loss = self
                .model
                .loss(&view1, &view2, cfg.temperature, cfg.loss_batch_size)?;
            let objective = if cfg.l2 > 0.0 {
                let mut penalty = Tensor::zeros((), DType::F32, &self.device)?;
                for var in &vars {
                    penalty = (penalty + var.as_tensor().sqr()?.sum_all()?)?;
                }
                (&loss + (penalty * (0.5 * cfg.l2))?)?
            } else {
                loss.clone()
            };
            optimizer.backward_step(&objective)?;

            let value = loss.to_scalar::<f32>()?;
            loss_history.push(value);
            let improved = value < best_loss;
            if improved {
                best_loss = value;
                best_epoch = epoch;
                if let Some(path) = checkpoint {
                    self.save(path)?;
                    saved = true;
                }
            }

            let report = EpochReport {
                epoch,
                loss: value,
                best_loss,
                improved,
            };
            tracing::debug!(epoch, loss = value, best = best_loss, improved, "epoch");
            on_epoch(&report);

            if let Some(patience) = cfg.patience {
                if epoch - best_epoch >= patience {
                    tracing::info!(epoch, best_epoch, "early stopping");
                    stopped_early = true;
                    break;
                }
            }
        }

        if let (true, Some(path)) = (saved, checkpoint) {
            tracing::info!(best_epoch, best_loss, path = %path.display(), "loading best checkpoint");
            self.load(path)?;
        }

        Ok(TrainingResult {
            loss_history,
            best_epoch,
            best_loss,
            stopped_early,
        })
    }

    /// Frozen embeddings `(N, out_dim)` of the unaugmented graph.
    pub fn embed(&self, graph: &Graph) -> Result<Tensor> {
        let view = GraphTensors::new(graph, &self.device)?;
        Ok(self.model.embed(&view)?.detach())
    }
}
