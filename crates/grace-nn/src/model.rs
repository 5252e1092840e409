//! The GRACE model: shared encoder plus projection head.

use candle_core::{Tensor, Var};
use candle_nn::{Module, VarBuilder, VarMap};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};

use crate::conv::GraphTensors;
use crate::encoder::{Activation, Encoder, ProjectionHead};
use crate::error::{Error, Result};
use crate::loss::contrastive_loss;

/// Architecture hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDims {
    pub in_dim: usize,
    pub hid_dim: usize,
    pub out_dim: usize,
    pub num_layers: usize,
    pub activation: Activation,
}

/// Re-initialise every variable in `varmap` from `seed`.
///
/// Variables are visited in sorted name order. Matrices get Glorot-uniform
/// weights, anything named `*bias` is zeroed, and the rest (PReLU slopes)
/// keep their construction-time value.
pub fn init_parameters(varmap: &VarMap, seed: u64) -> Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| Error::InvalidConfig("parameter store lock poisoned".into()))?;
    let mut named: Vec<(&String, &Var)> = data.iter().collect();
    named.sort_by(|a, b| a.0.cmp(b.0));

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for (name, var) in named {
        let shape = var.as_tensor().shape().clone();
        let device = var.as_tensor().device().clone();
        if name.ends_with("bias") {
            var.set(&var.as_tensor().zeros_like()?)?;
        } else if let [fan_out, fan_in] = shape.dims() {
            let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
            let dist = Uniform::new_inclusive(-bound, bound)
                .map_err(|e| Error::InvalidConfig(format!("glorot bound for {}: {}", name, e)))?;
            let values: Vec<f32> = (0..shape.elem_count()).map(|_| dist.sample(&mut rng)).collect();
            var.set(&Tensor::from_vec(values, shape, &device)?)?;
        }
    }
    Ok(())
}

/// Encoder and projection head sharing one parameter store.
pub struct GraceModel {
    encoder: Encoder,
    projection: ProjectionHead,
    dims: ModelDims,
}

impl GraceModel {
    /// Register all parameters in `vb` under `encoder.*` and `projection.*`.
    pub fn new(dims: ModelDims, vb: VarBuilder) -> Result<Self> {
        let encoder = Encoder::new(
            dims.in_dim,
            dims.hid_dim,
            dims.out_dim,
            dims.num_layers,
            dims.activation,
            vb.pp("encoder"),
        )?;
        let projection = ProjectionHead::new(dims.out_dim, dims.out_dim, vb.pp("projection"))?;
        Ok(Self {
            encoder,
            projection,
            dims,
        })
    }

    /// Encoder output `(N, out_dim)` for one view.
    pub fn embed(&self, view: &GraphTensors) -> Result<Tensor> {
        if view.x.dim(1)? != self.dims.in_dim {
            return Err(Error::DimensionMismatch {
                expected: self.dims.in_dim,
                got: view.x.dim(1)?,
            });
        }
        Ok(self.encoder.forward(&view.x, &view.adj)?)
    }

    /// Projection of encoder output into the contrastive space.
    pub fn project(&self, h: &Tensor) -> Result<Tensor> {
        Ok(self.projection.forward(h)?)
    }

    /// Contrastive loss between two views of the same graph.
    pub fn loss(
        &self,
        view1: &GraphTensors,
        view2: &GraphTensors,
        temperature: f64,
        batch_size: Option<usize>,
    ) -> Result<Tensor> {
        let z1 = self.project(&self.embed(view1)?)?;
        let z2 = self.project(&self.embed(view2)?)?;
        contrastive_loss(&z1, &z2, temperature, batch_size)
    }
}
