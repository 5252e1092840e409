//! Temperature-scaled InfoNCE over two views.
//!
//! With `h = z / ‖z‖` and `θ(u, v) = u·v / τ`, the loss of anchor `u_i` in
//! view one against view two is
//!
//! ```text
//! ℓ(u_i) = -θ(u_i, v_i) + log( Σ_j e^{θ(u_i, v_j)} + Σ_{j≠i} e^{θ(u_i, u_j)} )
//! ```
//!
//! The positive pair is node `i` in both views; every other node in either
//! view is a negative. The objective is symmetric:
//!
//! ```text
//! L = 1/(2N) Σ_i ( ℓ(u_i) + ℓ(v_i) )
//! ```
//!
//! The anchor's similarity with itself is masked out of the first sum rather
//! than subtracted, and the log of the denominator is evaluated as a
//! max-shifted log-sum-exp, so small temperatures do not overflow.
//!
//! Unbatched evaluation materialises two `N x N` similarity matrices. Passing
//! a row batch size evaluates the same sums in `(batch, N)` blocks instead.

use candle_core::{Tensor, D};

use crate::error::{Error, Result};

/// Scale each row to unit L2 norm. Zero rows stay zero.
pub fn l2_normalize(z: &Tensor) -> candle_core::Result<Tensor> {
    let norm = z.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?.maximum(1e-12)?;
    z.broadcast_div(&norm)
}

/// Added to a logit to remove it from the log-sum-exp.
const MASKED: f32 = -1e30;

/// Per-node loss of anchors `h1` against `h2`, both already normalised.
///
/// Returns a vector of length `N`.
pub fn semi_loss(h1: &Tensor, h2: &Tensor, tau: f64, batch_size: Option<usize>) -> candle_core::Result<Tensor> {
    let n = h1.dim(0)?;
    let step = batch_size.unwrap_or(n).max(1);
    let mut parts = Vec::with_capacity(n.div_ceil(step));
    let mut start = 0;
    while start < n {
        let len = step.min(n - start);
        parts.push(block_loss(
            &h1.narrow(0, start, len)?,
            &h2.narrow(0, start, len)?,
            h1,
            h2,
            start,
            tau,
        )?);
        start += len;
    }
    if parts.len() == 1 {
        return Ok(parts.remove(0));
    }
    Tensor::cat(&parts, 0)
}

/// `(len, n)` additive mask hiding each anchor's similarity with itself.
fn self_mask(len: usize, n: usize, start: usize, like: &Tensor) -> candle_core::Result<Tensor> {
    let mut mask = vec![0f32; len * n];
    for r in 0..len {
        mask[r * n + start + r] = MASKED;
    }
    Tensor::from_vec(mask, (len, n), like.device())?.to_dtype(like.dtype())
}

/// Loss of anchor rows `a1` (rows `start..` of `h1`, positives `a2`) against
/// all of `h1` and `h2`.
///
/// The denominator is a row-wise log-sum-exp shifted by its maximum, so any
/// `τ > 0` stays finite.
fn block_loss(
    a1: &Tensor,
    a2: &Tensor,
    h1: &Tensor,
    h2: &Tensor,
    start: usize,
    tau: f64,
) -> candle_core::Result<Tensor> {
    let len = a1.dim(0)?;
    let n = h1.dim(0)?;
    let refl = ((a1.matmul(&h1.t()?)? / tau)? + self_mask(len, n, start, a1)?)?;
    let between = (a1.matmul(&h2.t()?)? / tau)?;
    let logits = Tensor::cat(&[&refl, &between], 1)?;

    let max = logits.max_keepdim(D::Minus1)?.detach();
    let lse = (logits.broadcast_sub(&max)?.exp()?.sum(D::Minus1)?.log()? + max.squeeze(D::Minus1)?)?;
    let positive = ((a1 * a2)?.sum(D::Minus1)? / tau)?;
    lse - positive
}

/// Symmetric GRACE loss between projected views `z1` and `z2`, both `(N, d)`.
///
/// `batch_size` of `None` evaluates all rows at once.
pub fn contrastive_loss(z1: &Tensor, z2: &Tensor, tau: f64, batch_size: Option<usize>) -> Result<Tensor> {
    if !(tau.is_finite() && tau > 0.0) {
        return Err(Error::InvalidConfig(format!("temperature must be positive, got {}", tau)));
    }
    if batch_size == Some(0) {
        return Err(Error::InvalidConfig("loss batch size must be at least 1".into()));
    }
    let (n1, d1) = z1.dims2()?;
    let (n2, d2) = z2.dims2()?;
    if n1 != n2 {
        return Err(Error::DimensionMismatch { expected: n1, got: n2 });
    }
    if d1 != d2 {
        return Err(Error::DimensionMismatch { expected: d1, got: d2 });
    }

    let h1 = l2_normalize(z1)?;
    let h2 = l2_normalize(z2)?;
    let l1 = semi_loss(&h1, &h2, tau, batch_size)?;
    let l2 = semi_loss(&h2, &h1, tau, batch_size)?;
    Ok(((l1 + l2)? * 0.5)?.mean_all()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn matrix(n: usize, d: usize, salt: usize) -> Tensor {
        let data: Vec<f32> = (0..n * d)
            .map(|i| (((i * 37 + salt * 101) % 23) as f32 - 11.0) / 7.0)
            .collect();
        Tensor::from_vec(data, (n, d), &Device::Cpu).unwrap()
    }

    fn scalar(t: Tensor) -> f32 {
        t.to_scalar::<f32>().unwrap()
    }

    #[test]
    fn test_orthogonal_identical_views() {
        // Two orthogonal unit rows, τ = 1: ℓ = -1 + ln(2 + e)
        let z = Tensor::from_vec(vec![1f32, 0.0, 0.0, 1.0], (2, 2), &Device::Cpu).unwrap();
        let loss = scalar(contrastive_loss(&z, &z, 1.0, None).unwrap());
        let expected = -1.0 + (2.0 + std::f32::consts::E).ln();
        assert!((loss - expected).abs() < 1e-5, "{} vs {}", loss, expected);
    }

    #[test]
    fn test_small_temperature_stays_finite() {
        // τ = 0.01: ℓ = log(1 + 2e^{-100}), i.e. zero in f32
        let z = Tensor::from_vec(vec![1f32, 0.0, 0.0, 1.0], (2, 2), &Device::Cpu).unwrap();
        let loss = scalar(contrastive_loss(&z, &z, 0.01, None).unwrap());
        assert!(loss.is_finite());
        assert!(loss.abs() < 1e-6, "{}", loss);

        let z1 = matrix(9, 4, 11);
        let z2 = matrix(9, 4, 12);
        for tau in [0.01, 1e-3, 1e-5] {
            let full = scalar(contrastive_loss(&z1, &z2, tau, None).unwrap());
            let batched = scalar(contrastive_loss(&z1, &z2, tau, Some(4)).unwrap());
            assert!(full.is_finite(), "tau {}: {}", tau, full);
            assert!((full - batched).abs() <= 1e-4 * full.max(1.0), "tau {}", tau);
        }
    }

    #[test]
    fn test_small_temperature_has_finite_gradients() {
        let z1 = candle_core::Var::from_tensor(&matrix(6, 3, 13)).unwrap();
        let z2 = matrix(6, 3, 14);
        let loss = contrastive_loss(z1.as_tensor(), &z2, 0.005, Some(4)).unwrap();
        let grads = loss.backward().unwrap();
        let g = grads.get(z1.as_tensor()).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(g.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_loss_is_scale_invariant() {
        let z1 = matrix(6, 4, 1);
        let z2 = matrix(6, 4, 2);
        let a = scalar(contrastive_loss(&z1, &z2, 0.5, None).unwrap());
        let b = scalar(contrastive_loss(&(&z1 * 3.0).unwrap(), &z2, 0.5, None).unwrap());
        assert!((a - b).abs() < 1e-5);
    }

    #[test]
    fn test_loss_is_symmetric() {
        let z1 = matrix(7, 5, 3);
        let z2 = matrix(7, 5, 4);
        let a = scalar(contrastive_loss(&z1, &z2, 0.4, None).unwrap());
        let b = scalar(contrastive_loss(&z2, &z1, 0.4, None).unwrap());
        assert!((a - b).abs() < 1e-5);
    }

    #[test]
    fn test_permutation_invariance() {
        let z1 = matrix(8, 3, 5);
        let z2 = matrix(8, 3, 6);
        let perm = Tensor::from_vec(vec![3u32, 7, 0, 5, 1, 6, 2, 4], 8, &Device::Cpu).unwrap();
        let p1 = z1.index_select(&perm, 0).unwrap();
        let p2 = z2.index_select(&perm, 0).unwrap();
        let a = scalar(contrastive_loss(&z1, &z2, 0.4, None).unwrap());
        let b = scalar(contrastive_loss(&p1, &p2, 0.4, None).unwrap());
        assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
    }

    #[test]
    fn test_batched_matches_full() {
        let z1 = matrix(10, 4, 7);
        let z2 = matrix(10, 4, 8);
        let full = scalar(contrastive_loss(&z1, &z2, 0.4, None).unwrap());
        for batch in [1, 3, 10, 64] {
            let batched = scalar(contrastive_loss(&z1, &z2, 0.4, Some(batch)).unwrap());
            assert!((full - batched).abs() < 1e-5, "batch {}: {} vs {}", batch, full, batched);
        }
    }

    #[test]
    fn test_non_positive_temperature_rejected() {
        let z = matrix(3, 2, 0);
        for tau in [0.0, -0.5, f64::NAN] {
            assert!(matches!(
                contrastive_loss(&z, &z, tau, None),
                Err(Error::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_mismatched_views_rejected() {
        let err = contrastive_loss(&matrix(3, 2, 0), &matrix(4, 2, 0), 0.5, None).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, got: 4 }));
    }
}
