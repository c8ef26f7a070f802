//! Reference scaled dot-product attention kernel.
//!
//! `q`, `k` and `v` share the layout `[batch, n_heads, seq_len, head_dim]`
//! (`k` and `v` may have a different `seq_len` from `q`). The optional mask is
//! a boolean `(batch, q_len, k_len)` tensor broadcast across heads.

use candle_core::Tensor;
use candle_nn::ops::softmax_last_dim;
use layers::{checks, Dropout, ExecutionMode, LayerError, Result};

use crate::masks::MASK_DTYPE;

/// Score assigned to masked positions; effectively `-inf` after the softmax
/// while keeping fully-masked rows finite.
pub const MASK_FILL: f32 = -1e20;

/// Numerically stable, portable attention kernel.
#[derive(Debug, Clone)]
pub struct ExactAttention {
    dropout: Dropout,
}

impl ExactAttention {
    /// Construct a kernel applying `dropout_p` to the attention weights while training.
    pub fn new(dropout_p: f32) -> Result<Self> {
        Ok(Self {
            dropout: Dropout::new(dropout_p)?,
        })
    }

    /// Computes `softmax(mask(q kᵀ / sqrt(head_dim))) v`.
    pub fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: Option<&Tensor>,
        mode: &mut ExecutionMode,
    ) -> Result<Tensor> {
        let (batch, heads, q_len, head_dim) = q.dims4().map_err(|_| {
            LayerError::InvalidShape("q must have shape [batch, heads, seq_len, head_dim]".into())
        })?;
        let (kb, kh, k_len, kd) = k.dims4().map_err(|_| {
            LayerError::InvalidShape("k must have shape [batch, heads, seq_len, head_dim]".into())
        })?;
        if kb != batch || kh != heads || kd != head_dim {
            return Err(LayerError::InvalidShape(format!(
                "k shape mismatch: expected [{batch}, {heads}, ?, {head_dim}] got [{kb}, {kh}, {k_len}, {kd}]"
            )));
        }
        checks::expect_shape("v", v, &[batch, heads, k_len, head_dim])?;

        let merged = batch * heads;
        let q_view = q
            .affine((head_dim as f64).powf(-0.5), 0.0)?
            .reshape((merged, q_len, head_dim))?;
        let k_view = k.reshape((merged, k_len, head_dim))?;
        let scores = q_view
            .matmul(&k_view.transpose(1, 2)?)?
            .reshape((batch, heads, q_len, k_len))?;

        let scores = match mask {
            Some(mask) => {
                checks::expect_dtype("mask", mask, MASK_DTYPE)?;
                checks::expect_shape("mask", mask, &[batch, q_len, k_len])?;
                let mask = mask
                    .unsqueeze(1)?
                    .broadcast_as((batch, heads, q_len, k_len))?
                    .contiguous()?;
                let fill = Tensor::full(MASK_FILL, (batch, heads, q_len, k_len), q.device())?;
                mask.where_cond(&fill, &scores)?
            }
            None => scores,
        };

        let weights = softmax_last_dim(&scores.contiguous()?)?;
        let weights = self.dropout.forward(&weights, mode)?;

        let v_view = v.reshape((merged, k_len, head_dim))?;
        let context = weights
            .reshape((merged, q_len, k_len))?
            .matmul(&v_view)?
            .reshape((batch, heads, q_len, head_dim))?;
        Ok(context)
    }
}
