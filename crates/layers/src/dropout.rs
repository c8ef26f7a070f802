//! Dropout and the execution mode threaded through every forward pass.
//!
//! Dropout is the only stochastic element of the transformer core. Rather than
//! toggling hidden per-module state, callers pass an [`ExecutionMode`] into each
//! forward call: [`ExecutionMode::Inference`] turns every dropout into the
//! identity, [`ExecutionMode::Training`] carries the seeded RNG the masks are
//! drawn from, so runs are reproducible for a fixed seed.

use candle_core::Tensor;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{ensure_probability, Result};

/// Whether dropout is active, and the random source it draws from.
#[derive(Debug, Clone)]
pub enum ExecutionMode {
    /// Dropout disabled; forward passes are deterministic.
    Inference,
    /// Dropout enabled, masks sampled from the supplied RNG.
    Training { rng: StdRng },
}

impl ExecutionMode {
    /// Inference mode (no dropout).
    pub fn inference() -> Self {
        ExecutionMode::Inference
    }

    /// Training mode with a deterministic dropout seed.
    pub fn training(seed: u64) -> Self {
        ExecutionMode::Training {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

/// Inverted dropout: zeroes activations with probability `p` and rescales the
/// survivors by `1 / (1 - p)` while training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    probability: f32,
}

impl Dropout {
    pub fn new(probability: f32) -> Result<Self> {
        ensure_probability("dropout probability", probability)?;
        Ok(Self { probability })
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }

    /// Applies dropout to a tensor of any shape.
    pub fn forward(&self, tensor: &Tensor, mode: &mut ExecutionMode) -> Result<Tensor> {
        let rng = match mode {
            ExecutionMode::Training { rng } if self.probability > 0.0 => rng,
            _ => return Ok(tensor.clone()),
        };

        let keep_prob = 1.0 - self.probability;
        let total = tensor.elem_count();
        let mut mask_data = Vec::with_capacity(total);
        for _ in 0..total {
            let sample: f32 = rng.gen();
            mask_data.push(if sample < keep_prob { 1.0f32 } else { 0.0f32 });
        }
        let mask = Tensor::from_vec(mask_data, tensor.shape(), tensor.device())?;
        let dropped = tensor.mul(&mask)?.affine(1.0 / keep_prob as f64, 0.0)?;
        Ok(dropped)
    }
}
