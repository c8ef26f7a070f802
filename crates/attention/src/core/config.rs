//! Configuration options for multi-head attention.
//!
//! The [`AttentionConfig`] struct captures the projection width, head count and
//! dropout rate. It is validated once when the attention module is built.

use layers::{ensure_positive, ensure_probability, LayerError, Result};

/// Configuration driving attention behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionConfig {
    /// Width of the query/key/value projections and of the output.
    pub model_dim: usize,
    /// Number of parallel heads; must divide `model_dim`.
    pub head_count: usize,
    /// Probability for dropout applied to attention weights during training.
    pub dropout_p: f32,
}

impl AttentionConfig {
    pub fn new(model_dim: usize, head_count: usize) -> Self {
        Self {
            model_dim,
            head_count,
            dropout_p: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout_p: f32) -> Self {
        self.dropout_p = dropout_p;
        self
    }

    /// Width of a single head.
    pub fn dim_per_head(&self) -> usize {
        self.model_dim / self.head_count
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("model_dim", self.model_dim)?;
        ensure_positive("head_count", self.head_count)?;
        if self.model_dim % self.head_count != 0 {
            return Err(LayerError::InvalidConfiguration(format!(
                "model_dim ({}) must be divisible by head_count ({})",
                self.model_dim, self.head_count
            )));
        }
        ensure_probability("attention dropout", self.dropout_p)
    }
}
