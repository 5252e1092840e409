//! Shared GCN encoder and projection head.
//!
//! ```text
//!  view (X, Â) ──► GCNConv ─► act ─► … ─► GCNConv ─► act ──► H   (embeddings)
//!                                                          │
//!                                   fc1 ─► ELU ─► fc2 ◄────┘
//!                                                  │
//!                                                  ▼
//!                                                  Z   (contrastive space)
//! ```
//!
//! Layer widths are `in → hid → … → hid → out`; a single layer maps
//! `in → out` directly. Both augmented views pass through the same weights.

use std::fmt;
use std::str::FromStr;

use candle_core::{Result, Tensor};
use candle_nn::{linear, Linear, Module, PReLU, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::conv::{GCNConv, NormalizedAdjacency};

/// Non-linearity applied after every encoder layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    /// Channel-wise PReLU, slopes start at 0.25.
    Prelu,
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relu => f.write_str("relu"),
            Self::Prelu => f.write_str("prelu"),
        }
    }
}

impl FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relu" => Ok(Self::Relu),
            "prelu" => Ok(Self::Prelu),
            other => Err(format!("unknown activation '{}' (expected relu or prelu)", other)),
        }
    }
}

enum LayerActivation {
    Relu,
    Prelu(PReLU),
}

impl LayerActivation {
    fn new(kind: Activation, width: usize, vb: VarBuilder) -> Result<Self> {
        Ok(match kind {
            Activation::Relu => Self::Relu,
            Activation::Prelu => Self::Prelu(candle_nn::prelu(Some(width), vb)?),
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        match self {
            Self::Relu => x.relu(),
            Self::Prelu(p) => p.forward(x),
        }
    }
}

/// Stack of GCN layers, each followed by the configured activation.
pub struct Encoder {
    layers: Vec<GCNConv>,
    activations: Vec<LayerActivation>,
}

impl Encoder {
    /// Build a `num_layers`-deep encoder.
    ///
    /// Parameters are registered under `layers.{i}` and `act.{i}` of `vb`.
    pub fn new(
        in_dim: usize,
        hid_dim: usize,
        out_dim: usize,
        num_layers: usize,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self> {
        if num_layers == 0 {
            candle_core::bail!("encoder needs at least one layer");
        }
        let mut layers = Vec::with_capacity(num_layers);
        let mut activations = Vec::with_capacity(num_layers);
        for i in 0..num_layers {
            let d_in = if i == 0 { in_dim } else { hid_dim };
            let d_out = if i + 1 == num_layers { out_dim } else { hid_dim };
            layers.push(GCNConv::new(d_in, d_out, true, vb.pp(format!("layers.{}", i)))?);
            activations.push(LayerActivation::new(
                activation,
                d_out,
                vb.pp(format!("act.{}", i)),
            )?);
        }
        Ok(Self { layers, activations })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Node embeddings `(N, out_dim)` for features `x` over `adj`.
    pub fn forward(&self, x: &Tensor, adj: &NormalizedAdjacency) -> Result<Tensor> {
        let mut h = x.clone();
        for (layer, act) in self.layers.iter().zip(self.activations.iter()) {
            h = act.forward(&layer.forward(&h, adj)?)?;
        }
        Ok(h)
    }
}

/// Two-layer MLP mapping embeddings into the space the loss is computed in.
pub struct ProjectionHead {
    fc1: Linear,
    fc2: Linear,
}

impl ProjectionHead {
    pub fn new(dim: usize, hidden: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            fc1: linear(dim, hidden, vb.pp("fc1"))?,
            fc2: linear(hidden, dim, vb.pp("fc2"))?,
        })
    }
}

impl Module for ProjectionHead {
    fn forward(&self, h: &Tensor) -> Result<Tensor> {
        let z = self.fc1.forward(h)?.elu(1.0)?;
        self.fc2.forward(&z)
    }
}
