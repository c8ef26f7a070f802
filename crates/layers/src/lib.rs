//! Building blocks for transformer layers.
//!
//! This crate hosts the dense projections, layer normalisation, dropout and
//! feed-forward components assembled from Candle primitives, together with the
//! error taxonomy shared by every crate in the workspace.
//!
//! All tensors follow the `(batch, seq, hidden)` convention and are stored in
//! `f32`.

pub mod checks;
pub mod dropout;
pub mod linear;
pub mod mlp;
pub mod norm;

use thiserror::Error;

pub use dropout::{Dropout, ExecutionMode};
pub use linear::{Linear, LinearConfig, LinearInit};
pub use mlp::{FeedForward, FeedForwardConfig};
pub use norm::{LayerNorm, NormConfig};

/// Result alias used by every component of the transformer core.
pub type Result<T> = std::result::Result<T, LayerError>;

/// Error categories raised by layer construction and forward passes.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Dimension or hyper-parameter mismatch detected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A sequence or timestep exceeds a precomputed table.
    #[error("position overflow: {requested} positions requested but capacity is {capacity}")]
    PositionOverflow { requested: usize, capacity: usize },

    /// The supplied incremental decoding cache does not match the layer stack.
    #[error("invalid cache state: {0}")]
    InvalidCacheState(String),

    /// An input tensor violates the documented rank, dtype or value contract.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Failure propagated from the tensor backend.
    #[error(transparent)]
    Candle(#[from] candle_core::Error),
}

impl LayerError {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        LayerError::InvalidConfiguration(msg.into())
    }
}

/// Rejects zero-sized dimensions with an [`LayerError::InvalidConfiguration`].
pub fn ensure_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        Err(LayerError::config(format!("{name} must be greater than zero")))
    } else {
        Ok(())
    }
}

/// Rejects dropout probabilities outside `[0, 1)`.
pub fn ensure_probability(name: &str, value: f32) -> Result<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(LayerError::config(format!(
            "{name} must be in [0, 1), got {value}"
        )))
    }
}
