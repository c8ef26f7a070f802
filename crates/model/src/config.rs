//! Model hyperparameters and their file formats.

use std::{fs, path::Path};

use attention::AttentionConfig;
use candle_core::Device;
use embedding::TokenEmbeddingConfig;
use layers::{
    ensure_positive, ensure_probability, FeedForwardConfig, LayerError, NormConfig, Result,
};
use serde::{Deserialize, Serialize};

fn default_dropout() -> f32 {
    0.1
}

fn default_max_position_length() -> usize {
    embedding::DEFAULT_MAX_LEN
}

fn default_causal_table_len() -> usize {
    1000
}

fn default_layer_norm_eps() -> f64 {
    1e-5
}

/// Hyperparameters for the encoder/decoder transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub embedding_dim: usize,
    /// Source vocabulary; also the target vocabulary unless `target_vocab_size` is set.
    pub vocab_size: usize,
    #[serde(default)]
    pub target_vocab_size: Option<usize>,
    pub padding_index: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f32,
    pub num_layers: usize,
    pub num_heads: usize,
    /// Model width; must equal `embedding_dim`.
    pub hidden_size: usize,
    pub feed_forward_inner_size: usize,
    #[serde(default = "default_max_position_length")]
    pub max_position_length: usize,
    /// Rows in the precomputed causal mask; bounds full-sequence target length.
    #[serde(default = "default_causal_table_len")]
    pub causal_table_len: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default)]
    pub share_embeddings: bool,
    /// Seed for parameter initialization.
    #[serde(default)]
    pub seed: u64,
    #[serde(skip, default = "default_device")]
    pub device: Device,
}

fn default_device() -> Device {
    Device::Cpu
}

impl ModelConfig {
    /// A configuration with the usual defaults for the optional fields.
    pub fn new(
        vocab_size: usize,
        hidden_size: usize,
        num_layers: usize,
        num_heads: usize,
        feed_forward_inner_size: usize,
        padding_index: usize,
    ) -> Self {
        Self {
            embedding_dim: hidden_size,
            vocab_size,
            target_vocab_size: None,
            padding_index,
            dropout: default_dropout(),
            num_layers,
            num_heads,
            hidden_size,
            feed_forward_inner_size,
            max_position_length: default_max_position_length(),
            causal_table_len: default_causal_table_len(),
            layer_norm_eps: default_layer_norm_eps(),
            share_embeddings: false,
            seed: 0,
            device: default_device(),
        }
    }

    /// Loads a TOML or JSON configuration (chosen by file extension) and
    /// validates it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            LayerError::InvalidConfiguration(format!("reading {}: {err}", path.display()))
        })?;
        let config: ModelConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents).map_err(|err| {
                LayerError::InvalidConfiguration(format!("parsing {}: {err}", path.display()))
            })?,
            Some("toml") | None => toml::from_str(&contents).map_err(|err| {
                LayerError::InvalidConfiguration(format!("parsing {}: {err}", path.display()))
            })?,
            Some(other) => {
                return Err(LayerError::InvalidConfiguration(format!(
                    "unsupported configuration extension '{other}'"
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("embedding_dim", self.embedding_dim)?;
        ensure_positive("vocab_size", self.vocab_size)?;
        ensure_positive("num_layers", self.num_layers)?;
        ensure_positive("num_heads", self.num_heads)?;
        ensure_positive("hidden_size", self.hidden_size)?;
        ensure_positive("feed_forward_inner_size", self.feed_forward_inner_size)?;
        ensure_positive("max_position_length", self.max_position_length)?;
        ensure_positive("causal_table_len", self.causal_table_len)?;
        if let Some(target) = self.target_vocab_size {
            ensure_positive("target_vocab_size", target)?;
        }
        if self.embedding_dim != self.hidden_size {
            return Err(LayerError::InvalidConfiguration(format!(
                "embedding_dim ({}) must equal hidden_size ({})",
                self.embedding_dim, self.hidden_size
            )));
        }
        if self.embedding_dim % 2 != 0 {
            return Err(LayerError::InvalidConfiguration(format!(
                "embedding_dim ({}) must be even for sinusoidal positions",
                self.embedding_dim
            )));
        }
        if self.padding_index >= self.vocab_size.min(self.target_vocab_size()) {
            return Err(LayerError::InvalidConfiguration(format!(
                "padding_index {} out of range for vocabularies ({}, {})",
                self.padding_index,
                self.vocab_size,
                self.target_vocab_size()
            )));
        }
        if self.share_embeddings && self.target_vocab_size() != self.vocab_size {
            return Err(LayerError::InvalidConfiguration(format!(
                "cannot share embeddings between vocabularies of size {} and {}",
                self.vocab_size,
                self.target_vocab_size()
            )));
        }
        if !self.layer_norm_eps.is_finite() || self.layer_norm_eps <= 0.0 {
            return Err(LayerError::InvalidConfiguration(
                "layer_norm_eps must be positive".into(),
            ));
        }
        ensure_probability("dropout", self.dropout)?;
        self.attention_config().validate()
    }

    pub fn target_vocab_size(&self) -> usize {
        self.target_vocab_size.unwrap_or(self.vocab_size)
    }

    pub fn attention_config(&self) -> AttentionConfig {
        AttentionConfig::new(self.hidden_size, self.num_heads).with_dropout(self.dropout)
    }

    pub fn feed_forward_config(&self) -> FeedForwardConfig {
        FeedForwardConfig::new(self.hidden_size, self.feed_forward_inner_size, self.dropout)
    }

    pub fn norm_config(&self) -> NormConfig {
        NormConfig {
            hidden_size: self.hidden_size,
            epsilon: self.layer_norm_eps,
        }
    }

    pub fn source_embedding_config(&self) -> TokenEmbeddingConfig {
        self.embedding_config(self.vocab_size)
    }

    pub fn target_embedding_config(&self) -> TokenEmbeddingConfig {
        self.embedding_config(self.target_vocab_size())
    }

    fn embedding_config(&self, vocab_size: usize) -> TokenEmbeddingConfig {
        TokenEmbeddingConfig {
            dropout_p: self.dropout,
            max_len: self.max_position_length,
            ..TokenEmbeddingConfig::new(vocab_size, self.embedding_dim, self.padding_index)
        }
    }
}
