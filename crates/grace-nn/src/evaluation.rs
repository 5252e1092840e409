//! Linear-probe evaluation of frozen node embeddings.
//!
//! The embeddings are treated as fixed inputs: a single linear layer is
//! trained with softmax cross-entropy on the train nodes, validation accuracy
//! is tracked every epoch, and the reported test accuracy is the one measured
//! at the epoch of best validation accuracy.
//!
//! | Split | Used for |
//! |-------|----------|
//! | train | gradient steps |
//! | val   | model selection (best epoch) |
//! | test  | the reported number |
//!
//! With an empty validation set the classifier of the final epoch is scored.

use candle_core::{DType, Tensor, D};
use candle_nn::{linear, loss, AdamW, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use grace_core::NodeSplit;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::loss::l2_normalize;
use crate::model::init_parameters;

/// Linear classifier hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearProbeConfig {
    /// Adam learning rate (default: 0.01).
    pub learning_rate: f64,
    /// Decoupled weight decay (default: 0.0).
    pub weight_decay: f64,
    /// Training epochs (default: 300).
    pub epochs: usize,
    /// Scale embeddings to unit L2 norm first (default: true).
    pub normalize: bool,
    /// Classifier initialisation seed (default: 42).
    pub seed: u64,
}

impl Default for LinearProbeConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            weight_decay: 0.0,
            epochs: 300,
            normalize: true,
            seed: 42,
        }
    }
}

impl LinearProbeConfig {
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_weight_decay(mut self, wd: f64) -> Self {
        self.weight_decay = wd;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Probe results.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeMetrics {
    /// Train accuracy at the selected epoch.
    pub train_acc: f32,
    /// Best validation accuracy (0 with no validation nodes).
    pub val_acc: f32,
    /// Test accuracy at the selected epoch.
    pub test_acc: f32,
    /// 1-based epoch the metrics were taken at.
    pub epoch: usize,
}

impl ProbeMetrics {
    pub fn summary(&self) -> String {
        format!(
            "train: {:.4} | val: {:.4} | test: {:.4} (epoch {})",
            self.train_acc, self.val_acc, self.test_acc, self.epoch
        )
    }
}

/// Fraction of rows whose arg-max logit equals the label.
pub fn accuracy(logits: &Tensor, labels: &Tensor) -> Result<f32> {
    if labels.elem_count() == 0 {
        return Ok(0.0);
    }
    Ok(logits
        .argmax(D::Minus1)?
        .eq(labels)?
        .to_dtype(DType::F32)?
        .mean_all()?
        .to_scalar::<f32>()?)
}

struct Subset {
    x: Tensor,
    y: Tensor,
}

impl Subset {
    fn new(x: &Tensor, y: &Tensor, nodes: &[u32]) -> Result<Option<Self>> {
        if nodes.is_empty() {
            return Ok(None);
        }
        let idx = Tensor::from_slice(nodes, nodes.len(), x.device())?;
        Ok(Some(Self {
            x: x.index_select(&idx, 0)?,
            y: y.index_select(&idx, 0)?,
        }))
    }

    fn accuracy(&self, clf: &impl Module) -> Result<f32> {
        accuracy(&clf.forward(&self.x)?, &self.y)
    }
}

/// Train a linear classifier on `embeddings` and score it on `split`.
pub fn linear_probe(
    embeddings: &Tensor,
    labels: &[u32],
    num_classes: usize,
    split: &NodeSplit,
    config: &LinearProbeConfig,
) -> Result<ProbeMetrics> {
    let (n, dim) = embeddings.dims2()?;
    if labels.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: labels.len(),
        });
    }
    if let Some(&bad) = labels.iter().find(|&&l| l as usize >= num_classes) {
        return Err(Error::InvalidConfig(format!(
            "label {} out of range for {} classes",
            bad, num_classes
        )));
    }
    if config.epochs == 0 {
        return Err(Error::InvalidConfig("probe epochs must be at least 1".into()));
    }

    let device = embeddings.device();
    let x = embeddings.detach().to_dtype(DType::F32)?;
    let x = if config.normalize { l2_normalize(&x)? } else { x };
    let y = Tensor::from_slice(labels, n, device)?;

    let train = Subset::new(&x, &y, &split.train)?
        .ok_or_else(|| Error::InvalidConfig("no training nodes in split".into()))?;
    let val = Subset::new(&x, &y, &split.val)?;
    let test = Subset::new(&x, &y, &split.test)?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let clf = linear(dim, num_classes, vb.pp("probe"))?;
    init_parameters(&varmap, config.seed)?;
    let params = ParamsAdamW {
        lr: config.learning_rate,
        weight_decay: config.weight_decay,
        ..Default::default()
    };
    let mut optimizer = AdamW::new(varmap.all_vars(), params)?;

    let score = |epoch: usize, val_acc: f32| -> Result<ProbeMetrics> {
        Ok(ProbeMetrics {
            train_acc: train.accuracy(&clf)?,
            val_acc,
            test_acc: match &test {
                Some(t) => t.accuracy(&clf)?,
                None => 0.0,
            },
            epoch,
        })
    };

    let mut best: Option<ProbeMetrics> = None;
    for epoch in 1..=config.epochs {
        let logits = clf.forward(&train.x)?;
        let loss = loss::cross_entropy(&logits, &train.y)?;
        optimizer.backward_step(&loss)?;

        if let Some(val) = &val {
            let val_acc = val.accuracy(&clf)?;
            if best.map_or(true, |b| val_acc > b.val_acc) {
                best = Some(score(epoch, val_acc)?);
            }
        }
    }

    let metrics = match best {
        Some(m) => m,
        None => score(config.epochs, 0.0)?,
    };
    tracing::info!(
        train = metrics.train_acc,
        val = metrics.val_acc,
        test = metrics.test_acc,
        epoch = metrics.epoch,
        "linear probe finished"
    );
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    /// Three well-separated clusters in 4 dimensions.
    fn clusters(n: usize) -> (Tensor, Vec<u32>) {
        let mut data = Vec::with_capacity(n * 4);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let class = (i % 3) as u32;
            let jitter = (i % 5) as f32 * 0.02;
            for d in 0..4 {
                data.push(if d == class as usize { 1.0 + jitter } else { jitter });
            }
            labels.push(class);
        }
        (Tensor::from_vec(data, (n, 4), &Device::Cpu).unwrap(), labels)
    }

    fn split(n: u32) -> NodeSplit {
        NodeSplit {
            train: (0..9).collect(),
            val: (9..21).collect(),
            test: (21..n).collect(),
        }
    }

    #[test]
    fn test_accuracy() {
        let logits = Tensor::from_vec(vec![0.9f32, 0.1, 0.2, 0.8, 0.7, 0.3], (3, 2), &Device::Cpu).unwrap();
        let labels = Tensor::from_vec(vec![0u32, 1, 1], 3, &Device::Cpu).unwrap();
        let acc = accuracy(&logits, &labels).unwrap();
        assert!((acc - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_separable_embeddings_are_learned() {
        let (x, y) = clusters(60);
        let config = LinearProbeConfig::default().with_learning_rate(0.1).with_epochs(100);
        let metrics = linear_probe(&x, &y, 3, &split(60), &config).unwrap();
        assert_eq!(metrics.test_acc, 1.0);
        assert_eq!(metrics.val_acc, 1.0);
        assert!(metrics.epoch >= 1 && metrics.epoch <= 100);
    }

    #[test]
    fn test_without_validation_uses_last_epoch() {
        let (x, y) = clusters(30);
        let s = NodeSplit {
            train: (0..15).collect(),
            val: Vec::new(),
            test: (15..30).collect(),
        };
        let config = LinearProbeConfig::default().with_epochs(20);
        let metrics = linear_probe(&x, &y, 3, &s, &config).unwrap();
        assert_eq!(metrics.epoch, 20);
        assert_eq!(metrics.val_acc, 0.0);
    }

    #[test]
    fn test_probe_is_seeded() {
        let (x, y) = clusters(45);
        let config = LinearProbeConfig::default().with_epochs(10);
        let a = linear_probe(&x, &y, 3, &split(45), &config).unwrap();
        let b = linear_probe(&x, &y, 3, &split(45), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_label_count_must_match() {
        let (x, mut y) = clusters(30);
        y.pop();
        let err = linear_probe(&x, &y, 3, &split(30), &LinearProbeConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 30, got: 29 }));
    }

    #[test]
    fn test_out_of_range_label_rejected() {
        let (x, mut y) = clusters(30);
        y[4] = 7;
        let err = linear_probe(&x, &y, 3, &split(30), &LinearProbeConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
