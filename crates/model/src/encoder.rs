//! Encoder stack: token embedding followed by post-norm self-attention layers.

use attention::{masks::padding_mask, MultiHeadAttention};
use candle_core::{Device, Tensor};
use embedding::TokenEmbedding;
use layers::{checks, Dropout, ExecutionMode, FeedForward, LayerNorm, Result};
use rand::rngs::StdRng;

use crate::config::ModelConfig;

/// One encoder layer: self-attention then feed-forward, each wrapped in
/// dropout, a residual connection and a trailing LayerNorm.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    self_attn: MultiHeadAttention,
    feed_forward: FeedForward,
    norm_attn: LayerNorm,
    norm_ff: LayerNorm,
    dropout: Dropout,
}

impl EncoderLayer {
    pub fn new(config: &ModelConfig, rng: &mut StdRng, device: &Device) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::new(config.attention_config(), rng, device)?,
            feed_forward: FeedForward::new(config.feed_forward_config(), rng, device)?,
            norm_attn: LayerNorm::identity(config.norm_config(), device)?,
            norm_ff: LayerNorm::identity(config.norm_config(), device)?,
            dropout: Dropout::new(config.dropout)?,
        })
    }

    /// `hidden` is `(batch, seq, hidden_size)`; `mask` is `(batch, seq, seq)`.
    pub fn forward(
        &self,
        hidden: &Tensor,
        mask: Option<&Tensor>,
        mode: &mut ExecutionMode,
    ) -> Result<Tensor> {
        let attn = self.self_attn.attend(hidden, None, mask, mode)?;
        let attn = self.dropout.forward(&attn, mode)?;
        let hidden = self.norm_attn.forward(&(hidden + attn)?)?;

        let ff = self.feed_forward.forward(&hidden, mode)?;
        let ff = self.dropout.forward(&ff, mode)?;
        self.norm_ff.forward(&(hidden + ff)?)
    }
}

#[derive(Debug, Clone)]
pub struct Encoder {
    embedding: TokenEmbedding,
    layers: Vec<EncoderLayer>,
    hidden_size: usize,
}

impl Encoder {
    /// Builds an encoder with its own embedding table.
    pub fn new(config: &ModelConfig, rng: &mut StdRng, device: &Device) -> Result<Self> {
        config.validate()?;
        let embedding = TokenEmbedding::new(config.source_embedding_config(), rng, device)?;
        Self::with_embedding(config, embedding, rng, device)
    }

    /// Builds an encoder around an existing (possibly shared) embedding.
    pub fn with_embedding(
        config: &ModelConfig,
        embedding: TokenEmbedding,
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;
        let layers = (0..config.num_layers)
            .map(|_| EncoderLayer::new(config, rng, device))
            .collect::<Result<Vec<_>>>()?;
        log::info!(
            "encoder layers={} hidden={} heads={} inner={}",
            config.num_layers,
            config.hidden_size,
            config.num_heads,
            config.feed_forward_inner_size
        );
        Ok(Self {
            embedding,
            layers,
            hidden_size: config.hidden_size,
        })
    }

    pub fn embedding(&self) -> &TokenEmbedding {
        &self.embedding
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Encodes `src` `(batch, src_len)` token ids. `src_pad` is the `(batch,
    /// src_len)` padding flags; flagged keys are hidden from every query.
    pub fn forward(
        &self,
        src: &Tensor,
        src_pad: &Tensor,
        mode: &mut ExecutionMode,
    ) -> Result<Tensor> {
        let mut hidden = self.embedding.forward(src, 0, mode)?;
        let (batch, src_len) =
            checks::expect_batch_seq_hidden("encoder.embedded", &hidden, self.hidden_size)?;
        checks::expect_shape("src_pad", src_pad, &[batch, src_len])?;
        let mask = padding_mask(src_pad, src_len)?;

        for layer in &self.layers {
            hidden = layer.forward(&hidden, Some(&mask), mode)?;
        }
        Ok(hidden)
    }
}
