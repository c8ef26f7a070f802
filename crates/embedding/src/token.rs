//! Token embedding layer with additive sinusoidal positions.

use candle_core::{DType, Device, Tensor};
use layers::{
    checks, ensure_positive, Dropout, ExecutionMode, LayerError, Result,
};
use rand::{distributions::Distribution, rngs::StdRng};
use rand_distr::Normal;

use crate::positional::{PositionalTable, DEFAULT_MAX_LEN};

/// Configuration for building a token embedding table.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEmbeddingConfig {
    /// Size of the vocabulary (number of distinct tokens).
    pub vocab_size: usize,
    /// Dimensionality of each embedding vector.
    pub embedding_dim: usize,
    /// Row reserved for padding; always the zero vector.
    pub padding_idx: usize,
    /// Dropout applied to the summed embeddings while training.
    pub dropout_p: f32,
    /// Number of rows in the positional table.
    pub max_len: usize,
}

impl TokenEmbeddingConfig {
    pub fn new(vocab_size: usize, embedding_dim: usize, padding_idx: usize) -> Self {
        Self {
            vocab_size,
            embedding_dim,
            padding_idx,
            dropout_p: 0.0,
            max_len: DEFAULT_MAX_LEN,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("vocab_size", self.vocab_size)?;
        ensure_positive("embedding_dim", self.embedding_dim)?;
        ensure_positive("max_len", self.max_len)?;
        if self.padding_idx >= self.vocab_size {
            return Err(LayerError::InvalidConfiguration(format!(
                "padding_idx {} out of range for vocab size {}",
                self.padding_idx, self.vocab_size
            )));
        }
        Ok(())
    }
}

/// Learnable token embedding table combined with fixed sinusoidal positions.
///
/// Cloning shares the underlying weight storage, which is how source and target
/// embeddings are tied.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    config: TokenEmbeddingConfig,
    weight: Tensor,
    positional: PositionalTable,
    dropout: Dropout,
}

impl TokenEmbedding {
    /// Builds a table sampled from `N(0, embedding_dim^-0.5)` with a zero padding row.
    pub fn new(config: TokenEmbeddingConfig, rng: &mut StdRng, device: &Device) -> Result<Self> {
        config.validate()?;
        let dropout = Dropout::new(config.dropout_p)?;
        let positional = PositionalTable::new(config.embedding_dim, config.max_len, device)?;

        let dim = config.embedding_dim;
        let std = (dim as f32).powf(-0.5);
        let normal = Normal::new(0f32, std).map_err(|err| {
            LayerError::InvalidConfiguration(format!("embedding init: {err}"))
        })?;
        let mut data: Vec<f32> = normal
            .sample_iter(&mut *rng)
            .take(config.vocab_size * dim)
            .collect();
        let pad_row = config.padding_idx * dim;
        data[pad_row..pad_row + dim].fill(0.0);
        let weight = Tensor::from_vec(data, (config.vocab_size, dim), device)?;

        log::debug!(
            "token embedding vocab={} dim={} padding_idx={} max_len={}",
            config.vocab_size,
            dim,
            config.padding_idx,
            config.max_len
        );

        Ok(Self {
            config,
            weight,
            positional,
            dropout,
        })
    }

    /// Returns the embedding configuration.
    pub fn config(&self) -> &TokenEmbeddingConfig {
        &self.config
    }

    pub fn padding_idx(&self) -> usize {
        self.config.padding_idx
    }

    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    /// The `(vocab_size, embedding_dim)` weight tensor.
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn positional(&self) -> &PositionalTable {
        &self.positional
    }

    /// Embeds `(batch, seq)` token ids placed at positions
    /// `[timestep, timestep + seq)`, returning `(batch, seq, embedding_dim)`.
    ///
    /// The lookup is scaled by `sqrt(embedding_dim)` before the positional
    /// vectors are added, and the sum is scaled by `sqrt(embedding_dim)` once
    /// more. Trained checkpoints depend on this double scaling, so it is kept
    /// even though the second factor looks redundant.
    pub fn forward(
        &self,
        token_ids: &Tensor,
        timestep: usize,
        mode: &mut ExecutionMode,
    ) -> Result<Tensor> {
        let (batch, seq) = self.validate_token_ids(token_ids)?;
        let positions = self.positional.slice(timestep, seq)?;

        let ids = token_ids.to_dtype(DType::I64)?.flatten_all()?;
        self.ensure_id_range(&ids)?;
        let ids = ids.to_dtype(DType::U32)?;

        let scale = (self.config.embedding_dim as f64).sqrt();
        let gathered = self
            .weight
            .index_select(&ids, 0)?
            .reshape((batch, seq, self.config.embedding_dim))?;
        let embedded = gathered
            .affine(scale, 0.0)?
            .broadcast_add(&positions)?
            .affine(scale, 0.0)?;
        self.dropout.forward(&embedded, mode)
    }

    fn validate_token_ids(&self, token_ids: &Tensor) -> Result<(usize, usize)> {
        checks::expect_rank("token_ids", token_ids, 2)?;
        if !token_ids.dtype().is_int() {
            return Err(LayerError::InvalidShape(format!(
                "token_ids expected integer dtype but received {:?}",
                token_ids.dtype()
            )));
        }
        let (batch, seq) = token_ids.dims2()?;
        if batch == 0 || seq == 0 {
            return Err(LayerError::InvalidShape(
                "token_ids must have non-zero batch and seq dimensions".into(),
            ));
        }
        Ok((batch, seq))
    }

    fn ensure_id_range(&self, flat_ids: &Tensor) -> Result<()> {
        let min_id = flat_ids.min(0)?.to_scalar::<i64>()?;
        if min_id < 0 {
            return Err(LayerError::InvalidShape(format!(
                "encountered negative token id {min_id}"
            )));
        }
        let max_id = flat_ids.max(0)?.to_scalar::<i64>()?;
        let vocab = self.config.vocab_size as i64;
        if max_id >= vocab {
            return Err(LayerError::InvalidShape(format!(
                "token id {max_id} exceeds vocab size {vocab}"
            )));
        }
        Ok(())
    }
}
