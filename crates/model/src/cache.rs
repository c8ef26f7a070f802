//! Caller-owned state for incremental decoding.

use candle_core::Tensor;
use layers::{LayerError, Result};

/// Inputs seen by every decoder layer so far, shaped
/// `(batch, num_layers, steps, model_dim)`.
///
/// Each decode call returns a fresh cache; the previous one is never mutated,
/// so a caller can branch (e.g. for beam search) by keeping older values.
#[derive(Debug, Clone)]
pub struct DecodeCache {
    inputs: Tensor,
}

impl DecodeCache {
    /// Wraps a raw cache tensor, rejecting anything that is not rank 4.
    pub fn from_tensor(inputs: Tensor) -> Result<Self> {
        if inputs.rank() != 4 {
            return Err(LayerError::InvalidCacheState(format!(
                "expected (batch, num_layers, steps, model_dim), got {:?}",
                inputs.dims()
            )));
        }
        Ok(Self { inputs })
    }

    pub fn batch(&self) -> usize {
        self.inputs.dims()[0]
    }

    pub fn num_layers(&self) -> usize {
        self.inputs.dims()[1]
    }

    /// Number of target positions already decoded.
    pub fn steps(&self) -> usize {
        self.inputs.dims()[2]
    }

    pub fn model_dim(&self) -> usize {
        self.inputs.dims()[3]
    }

    /// Cached inputs of layer `index`, shaped `(batch, steps, model_dim)`.
    pub fn layer(&self, index: usize) -> Result<Tensor> {
        if index >= self.num_layers() {
            return Err(LayerError::InvalidCacheState(format!(
                "layer {index} out of range for cache with {} layers",
                self.num_layers()
            )));
        }
        Ok(self.inputs.narrow(1, index, 1)?.squeeze(1)?)
    }

    pub fn tensor(&self) -> &Tensor {
        &self.inputs
    }
}
