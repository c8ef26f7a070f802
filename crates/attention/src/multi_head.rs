//! Multi-head attention with learned projections.
//!
//! Self-attention without a separate memory uses a single fused `qkv`
//! projection. When `memory` is supplied (decoder self-attention over the
//! cached prefix, or cross-attention over encoder output) the query comes from
//! `query` and a fused `kv` projection is applied to `memory`.

use candle_core::{Device, Tensor};
use layers::{checks, ExecutionMode, LayerError, Linear, LinearConfig, LinearInit, Result};
use rand::rngs::StdRng;

use crate::{core::AttentionConfig, reference::ExactAttention};

#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    config: AttentionConfig,
    linear_q: Linear,
    linear_kv: Linear,
    linear_qkv: Linear,
    final_linear: Linear,
    kernel: ExactAttention,
}

impl MultiHeadAttention {
    /// Builds the projections with Xavier-uniform weights and zero biases.
    pub fn new(config: AttentionConfig, rng: &mut StdRng, device: &Device) -> Result<Self> {
        config.validate()?;
        let dim = config.model_dim;
        let init = LinearInit::XavierUniform;
        let linear_q = Linear::with_init(LinearConfig::new(dim, dim), &init, rng, device)?;
        let linear_kv = Linear::with_init(LinearConfig::fused(dim, dim, 2), &init, rng, device)?;
        let linear_qkv = Linear::with_init(LinearConfig::fused(dim, dim, 3), &init, rng, device)?;
        let final_linear = Linear::with_init(LinearConfig::new(dim, dim), &init, rng, device)?;
        let kernel = ExactAttention::new(config.dropout_p)?;

        log::debug!(
            "multi-head attention model_dim={} heads={} dropout={}",
            dim,
            config.head_count,
            config.dropout_p
        );

        Ok(Self {
            config,
            linear_q,
            linear_kv,
            linear_qkv,
            final_linear,
            kernel,
        })
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    /// Attends `query` `(batch, q_len, model_dim)` over `memory`
    /// `(batch, k_len, model_dim)`, or over `query` itself when `memory` is
    /// `None`. `mask` is a `(batch, q_len, k_len)` boolean tensor.
    pub fn attend(
        &self,
        query: &Tensor,
        memory: Option<&Tensor>,
        mask: Option<&Tensor>,
        mode: &mut ExecutionMode,
    ) -> Result<Tensor> {
        let dim = self.config.model_dim;
        let (batch, q_len) = checks::expect_batch_seq_hidden("attention.query", query, dim)?;

        let (q, k, v) = match memory {
            None => {
                let qkv = self.linear_qkv.forward(query)?;
                (
                    qkv.narrow(2, 0, dim)?,
                    qkv.narrow(2, dim, dim)?,
                    qkv.narrow(2, 2 * dim, dim)?,
                )
            }
            Some(memory) => {
                let (mem_batch, _) =
                    checks::expect_batch_seq_hidden("attention.memory", memory, dim)?;
                if mem_batch != batch {
                    return Err(LayerError::InvalidShape(format!(
                        "attention.memory batch {mem_batch} does not match query batch {batch}"
                    )));
                }
                let kv = self.linear_kv.forward(memory)?;
                (
                    self.linear_q.forward(query)?,
                    kv.narrow(2, 0, dim)?,
                    kv.narrow(2, dim, dim)?,
                )
            }
        };

        let context = self.kernel.attend(
            &self.split_heads(&q)?,
            &self.split_heads(&k)?,
            &self.split_heads(&v)?,
            mask,
            mode,
        )?;
        let merged = self.merge_heads(&context, batch, q_len)?;
        self.final_linear.forward(&merged)
    }

    fn split_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let (batch, seq, _) = tensor.dims3()?;
        let heads = self.config.head_count;
        Ok(tensor
            .reshape((batch, seq, heads, self.config.dim_per_head()))?
            .permute((0, 2, 1, 3))?
            .contiguous()?)
    }

    fn merge_heads(&self, tensor: &Tensor, batch: usize, seq: usize) -> Result<Tensor> {
        Ok(tensor
            .permute((0, 2, 1, 3))?
            .contiguous()?
            .reshape((batch, seq, self.config.model_dim))?)
    }
}
