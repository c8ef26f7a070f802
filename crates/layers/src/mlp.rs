//! Position-wise feed-forward block.
//!
//! Operates on hidden states shaped `(batch, seq, hidden)` and returns the same
//! layout: the hidden dimension is expanded to `inner_size`, passed through a
//! ReLU and dropout, then contracted back to `hidden_size`.

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;

use crate::{
    dropout::{Dropout, ExecutionMode},
    ensure_positive,
    linear::{Linear, LinearConfig, LinearInit},
    Result,
};

/// Configuration shared by transformer feed-forward networks.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardConfig {
    /// Model hidden size.
    pub hidden_size: usize,
    /// Width of the activation space.
    pub inner_size: usize,
    /// Dropout applied after the activation while training.
    pub dropout_p: f32,
}

impl FeedForwardConfig {
    pub fn new(hidden_size: usize, inner_size: usize, dropout_p: f32) -> Self {
        Self {
            hidden_size,
            inner_size,
            dropout_p,
        }
    }
}

/// Two-layer ReLU MLP with Xavier-uniform weights and zero biases.
#[derive(Debug, Clone)]
pub struct FeedForward {
    config: FeedForwardConfig,
    linear_in: Linear,
    linear_out: Linear,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(config: FeedForwardConfig, rng: &mut StdRng, device: &Device) -> Result<Self> {
        ensure_positive("feed-forward hidden_size", config.hidden_size)?;
        ensure_positive("feed-forward inner_size", config.inner_size)?;
        let dropout = Dropout::new(config.dropout_p)?;
        let linear_in = Linear::with_init(
            LinearConfig::new(config.hidden_size, config.inner_size),
            &LinearInit::XavierUniform,
            rng,
            device,
        )?;
        let linear_out = Linear::with_init(
            LinearConfig::new(config.inner_size, config.hidden_size),
            &LinearInit::XavierUniform,
            rng,
            device,
        )?;
        Ok(Self {
            config,
            linear_in,
            linear_out,
            dropout,
        })
    }

    /// Builds the block from existing projections.
    pub fn from_parts(
        config: FeedForwardConfig,
        linear_in: Linear,
        linear_out: Linear,
    ) -> Result<Self> {
        let dropout = Dropout::new(config.dropout_p)?;
        Ok(Self {
            config,
            linear_in,
            linear_out,
            dropout,
        })
    }

    pub fn config(&self) -> &FeedForwardConfig {
        &self.config
    }

    pub fn forward(&self, hidden: &Tensor, mode: &mut ExecutionMode) -> Result<Tensor> {
        let inner = self.linear_in.forward(hidden)?.relu()?;
        let inner = self.dropout.forward(&inner, mode)?;
        self.linear_out.forward(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use rand::SeedableRng;

    #[test]
    fn forward_preserves_layout() -> Result<()> {
        let device = Device::Cpu;
        let mut rng = StdRng::seed_from_u64(0);
        let ff = FeedForward::new(FeedForwardConfig::new(8, 32, 0.1), &mut rng, &device)?;
        let input = Tensor::randn(0f32, 1.0, (2, 5, 8), &device)?;
        let out = ff.forward(&input, &mut ExecutionMode::inference())?;
        assert_eq!(out.dims(), &[2, 5, 8]);
        Ok(())
    }

    #[test]
    fn relu_clips_negative_branch() -> Result<()> {
        let device = Device::Cpu;
        let config = FeedForwardConfig::new(2, 2, 0.0);
        let identity = Tensor::from_vec(vec![1f32, 0., 0., 1.], (2, 2), &device)?;
        let zeros = Tensor::zeros(2, DType::F32, &device)?;
        let linear_in = Linear::new(
            LinearConfig::new(2, 2),
            identity.clone(),
            Some(zeros.clone()),
        )?;
        let linear_out = Linear::new(LinearConfig::new(2, 2), identity, Some(zeros))?;
        let ff = FeedForward::from_parts(config, linear_in, linear_out)?;

        let input = Tensor::from_vec(vec![-1f32, 2.0], (1, 1, 2), &device)?;
        let out = ff.forward(&input, &mut ExecutionMode::inference())?;
        assert_eq!(out.flatten_all()?.to_vec1::<f32>()?, vec![0.0, 2.0]);
        Ok(())
    }

    #[test]
    fn training_mode_is_seeded() -> Result<()> {
        let device = Device::Cpu;
        let mut rng = StdRng::seed_from_u64(5);
        let ff = FeedForward::new(FeedForwardConfig::new(4, 16, 0.5), &mut rng, &device)?;
        let input = Tensor::randn(0f32, 1.0, (1, 3, 4), &device)?;
        let a = ff.forward(&input, &mut ExecutionMode::training(9))?;
        let b = ff.forward(&input, &mut ExecutionMode::training(9))?;
        let diff = a.sub(&b)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }
}
