//! Seq2seq facade over the encoder and decoder stacks.

use attention::masks::padding_flags;
use candle_core::Tensor;
use embedding::TokenEmbedding;
use layers::{ExecutionMode, Result};
use rand::{rngs::StdRng, SeedableRng};

use crate::{cache::DecodeCache, config::ModelConfig, decoder::Decoder, encoder::Encoder};

/// Encoder result kept around for every decoding step.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// `(batch, src_len, hidden_size)` encoder states.
    pub hidden: Tensor,
    /// `(batch, src_len)` source padding flags.
    pub src_pad: Tensor,
}

/// Encoder/decoder transformer built from a single [`ModelConfig`].
#[derive(Debug, Clone)]
pub struct Transformer {
    config: ModelConfig,
    encoder: Encoder,
    decoder: Decoder,
}

impl Transformer {
    /// Builds the model, drawing every parameter from an RNG seeded with
    /// `config.seed`.
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let device = config.device.clone();
        let mut rng = StdRng::seed_from_u64(config.seed);

        let source = TokenEmbedding::new(config.source_embedding_config(), &mut rng, &device)?;
        let target = if config.share_embeddings {
            source.clone()
        } else {
            TokenEmbedding::new(config.target_embedding_config(), &mut rng, &device)?
        };
        let encoder = Encoder::with_embedding(&config, source, &mut rng, &device)?;
        let decoder = Decoder::with_embedding(&config, target, &mut rng, &device)?;

        log::info!(
            "transformer vocab={} target_vocab={} hidden={} layers={} heads={} shared_embeddings={}",
            config.vocab_size,
            config.target_vocab_size(),
            config.hidden_size,
            config.num_layers,
            config.num_heads,
            config.share_embeddings
        );

        Ok(Self {
            config,
            encoder,
            decoder,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Encodes `(batch, src_len)` source ids.
    pub fn encode(&self, src: &Tensor, mode: &mut ExecutionMode) -> Result<EncoderOutput> {
        let src_pad = padding_flags(src, self.config.padding_index)?;
        let hidden = self.encoder.forward(src, &src_pad, mode)?;
        Ok(EncoderOutput { hidden, src_pad })
    }

    /// Full-sequence decoding of `(batch, tgt_len)` target ids.
    pub fn decode(
        &self,
        tgt: &Tensor,
        encoded: &EncoderOutput,
        mode: &mut ExecutionMode,
    ) -> Result<(Tensor, DecodeCache)> {
        let tgt_pad = padding_flags(tgt, self.config.padding_index)?;
        self.decoder.forward(
            tgt,
            &encoded.hidden,
            &encoded.src_pad,
            Some(&tgt_pad),
            None,
            0,
            mode,
        )
    }

    /// Decodes the next `(batch, 1)` step, positioned after everything in
    /// `cache`. Several steps may be passed at once; they are masked causally
    /// against each other.
    pub fn decode_step(
        &self,
        step_ids: &Tensor,
        encoded: &EncoderOutput,
        cache: Option<&DecodeCache>,
        mode: &mut ExecutionMode,
    ) -> Result<(Tensor, DecodeCache)> {
        let timestep = cache.map_or(0, DecodeCache::steps);
        self.decoder.forward(
            step_ids,
            &encoded.hidden,
            &encoded.src_pad,
            None,
            cache,
            timestep,
            mode,
        )
    }
}
