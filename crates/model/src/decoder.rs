//! Decoder stack with full-sequence and incremental modes.
//!
//! Every layer remembers its *input* rather than projected keys and values:
//! self-attention at step `t` attends over the concatenation of all inputs the
//! layer has seen so far. The stacked inputs are returned to the caller as a
//! [`DecodeCache`] and handed back on the next step.

use attention::{
    masks::{causal_mask, decoder_self_mask, offset_causal_mask, padding_mask},
    MultiHeadAttention,
};
use candle_core::{Device, Tensor};
use embedding::TokenEmbedding;
use layers::{checks, Dropout, ExecutionMode, FeedForward, LayerError, LayerNorm, Result};
use rand::rngs::StdRng;

use crate::{cache::DecodeCache, config::ModelConfig};

#[derive(Debug, Clone)]
pub struct DecoderLayer {
    self_attn: MultiHeadAttention,
    src_attn: MultiHeadAttention,
    feed_forward: FeedForward,
    norm_self: LayerNorm,
    norm_src: LayerNorm,
    norm_ff: LayerNorm,
    dropout: Dropout,
}

impl DecoderLayer {
    pub fn new(config: &ModelConfig, rng: &mut StdRng, device: &Device) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::new(config.attention_config(), rng, device)?,
            src_attn: MultiHeadAttention::new(config.attention_config(), rng, device)?,
            feed_forward: FeedForward::new(config.feed_forward_config(), rng, device)?,
            norm_self: LayerNorm::identity(config.norm_config(), device)?,
            norm_src: LayerNorm::identity(config.norm_config(), device)?,
            norm_ff: LayerNorm::identity(config.norm_config(), device)?,
            dropout: Dropout::new(config.dropout)?,
        })
    }

    /// Runs the layer on `hidden` `(batch, T, D)` and returns the output along
    /// with `previous ⧺ hidden`, the input history to cache for the next step.
    pub fn forward(
        &self,
        hidden: &Tensor,
        enc_out: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        previous: Option<&Tensor>,
        mode: &mut ExecutionMode,
    ) -> Result<(Tensor, Tensor)> {
        let all_input = match previous {
            Some(previous) => Tensor::cat(&[previous, hidden], 1)?,
            None => hidden.clone(),
        };

        let attn = self
            .self_attn
            .attend(hidden, Some(&all_input), tgt_mask, mode)?;
        let attn = self.dropout.forward(&attn, mode)?;
        let query = self.norm_self.forward(&(hidden + attn)?)?;

        let context = self.src_attn.attend(&query, Some(enc_out), src_mask, mode)?;
        let context = self.dropout.forward(&context, mode)?;
        let mid = self.norm_src.forward(&(query + context)?)?;

        let ff = self.feed_forward.forward(&mid, mode)?;
        let ff = self.dropout.forward(&ff, mode)?;
        let out = self.norm_ff.forward(&(mid + ff)?)?;
        Ok((out, all_input))
    }
}

#[derive(Debug, Clone)]
pub struct Decoder {
    embedding: TokenEmbedding,
    layers: Vec<DecoderLayer>,
    causal_table: Tensor,
    hidden_size: usize,
}

impl Decoder {
    pub fn new(config: &ModelConfig, rng: &mut StdRng, device: &Device) -> Result<Self> {
        config.validate()?;
        let embedding = TokenEmbedding::new(config.target_embedding_config(), rng, device)?;
        Self::with_embedding(config, embedding, rng, device)
    }

    pub fn with_embedding(
        config: &ModelConfig,
        embedding: TokenEmbedding,
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;
        let layers = (0..config.num_layers)
            .map(|_| DecoderLayer::new(config, rng, device))
            .collect::<Result<Vec<_>>>()?;
        let causal_table = causal_mask(device, config.causal_table_len)?;
        log::info!(
            "decoder layers={} hidden={} heads={} causal_table={}",
            config.num_layers,
            config.hidden_size,
            config.num_heads,
            config.causal_table_len
        );
        Ok(Self {
            embedding,
            layers,
            causal_table,
            hidden_size: config.hidden_size,
        })
    }

    pub fn embedding(&self) -> &TokenEmbedding {
        &self.embedding
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Decodes `tgt` `(batch, T)` against `enc_out` `(batch, S, D)`.
    ///
    /// With `previous = None` the whole target is processed at once under a
    /// causal mask (plus `tgt_pad`, when given). With a cache, `tgt` holds the
    /// next step(s) placed at `timestep`; a single step is attended without a
    /// self mask.
    ///
    /// Returns the `(batch, T, D)` output and the updated cache.
    #[allow(clippy::too_many_arguments)]
    pub fn forward(
        &self,
        tgt: &Tensor,
        enc_out: &Tensor,
        src_pad: &Tensor,
        tgt_pad: Option<&Tensor>,
        previous: Option<&DecodeCache>,
        timestep: usize,
        mode: &mut ExecutionMode,
    ) -> Result<(Tensor, DecodeCache)> {
        let mut hidden = self.embedding.forward(tgt, timestep, mode)?;
        let (batch, tgt_len) =
            checks::expect_batch_seq_hidden("decoder.embedded", &hidden, self.hidden_size)?;
        let (_, src_len) =
            checks::expect_batch_seq_hidden("decoder.enc_out", enc_out, self.hidden_size)?;
        checks::expect_shape("src_pad", src_pad, &[batch, src_len])?;
        if let Some(previous) = previous {
            self.check_cache(previous, batch)?;
        }

        let src_mask = padding_mask(src_pad, tgt_len)?;
        let tgt_mask = self.self_mask(batch, tgt_len, tgt_pad, previous, enc_out.device())?;
        log::debug!(
            "decode tgt_len={} timestep={} cached_steps={}",
            tgt_len,
            timestep,
            previous.map_or(0, DecodeCache::steps)
        );

        let mut all_inputs = Vec::with_capacity(self.layers.len());
        for (index, layer) in self.layers.iter().enumerate() {
            let layer_previous = previous.map(|cache| cache.layer(index)).transpose()?;
            let (out, all_input) = layer.forward(
                &hidden,
                enc_out,
                Some(&src_mask),
                tgt_mask.as_ref(),
                layer_previous.as_ref(),
                mode,
            )?;
            hidden = out;
            all_inputs.push(all_input);
        }

        let cache = DecodeCache::from_tensor(Tensor::stack(&all_inputs, 1)?)?;
        Ok((hidden, cache))
    }

    fn check_cache(&self, cache: &DecodeCache, batch: usize) -> Result<()> {
        let expected = (batch, self.layers.len(), self.hidden_size);
        let actual = (cache.batch(), cache.num_layers(), cache.model_dim());
        if expected != actual {
            return Err(LayerError::InvalidCacheState(format!(
                "cache (batch, layers, model_dim) = {actual:?}, decoder expects {expected:?}"
            )));
        }
        Ok(())
    }

    fn self_mask(
        &self,
        batch: usize,
        tgt_len: usize,
        tgt_pad: Option<&Tensor>,
        previous: Option<&DecodeCache>,
        device: &Device,
    ) -> Result<Option<Tensor>> {
        let capacity = self.causal_table.dims()[0];
        match previous {
            None => {
                if tgt_len > capacity {
                    return Err(LayerError::PositionOverflow {
                        requested: tgt_len,
                        capacity,
                    });
                }
                let mask = match tgt_pad {
                    Some(tgt_pad) => {
                        checks::expect_shape("tgt_pad", tgt_pad, &[batch, tgt_len])?;
                        decoder_self_mask(&self.causal_table, tgt_pad)?
                    }
                    None => self
                        .causal_table
                        .narrow(0, 0, tgt_len)?
                        .narrow(1, 0, tgt_len)?
                        .unsqueeze(0)?
                        .broadcast_as((batch, tgt_len, tgt_len))?
                        .contiguous()?,
                };
                Ok(Some(mask))
            }
            Some(_) if tgt_len == 1 => Ok(None),
            Some(cache) => {
                let k_len = cache.steps() + tgt_len;
                let mask = offset_causal_mask(device, tgt_len, k_len)?
                    .unsqueeze(0)?
                    .broadcast_as((batch, tgt_len, k_len))?
                    .contiguous()?;
                Ok(Some(mask))
            }
        }
    }
}
