//! Layer normalisation with learnable affine parameters.
//!
//! Inputs follow the `(batch, seq, hidden)` convention. Normalisation happens
//! along the last axis while preserving the original layout: each position is
//! rescaled to zero mean and unit (biased) variance, then multiplied by `weight`
//! and shifted by `bias`.

use candle_core::{DType, Device, Tensor, D};

use crate::{checks, ensure_positive, LayerError, Result};

/// Configuration for a normalisation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct NormConfig {
    /// Size of the hidden dimension being normalised.
    pub hidden_size: usize,
    /// Numeric stabiliser added to the variance.
    pub epsilon: f64,
}

impl NormConfig {
    /// Creates a configuration using defaults aligned with transformer blocks.
    pub fn new(hidden_size: usize) -> Self {
        Self {
            hidden_size,
            epsilon: 1e-5,
        }
    }
}

/// Standard LayerNorm with learnable scale and bias.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    config: NormConfig,
    weight: Tensor,
    bias: Tensor,
}

impl LayerNorm {
    /// Constructs a LayerNorm from explicit scale and bias parameters.
    pub fn new(weight: Tensor, bias: Tensor, config: NormConfig) -> Result<Self> {
        ensure_positive("norm hidden_size", config.hidden_size)?;
        if !(config.epsilon > 0.0) {
            return Err(LayerError::InvalidConfiguration(format!(
                "norm epsilon must be positive, got {}",
                config.epsilon
            )));
        }
        checks::expect_shape("norm.weight", &weight, &[config.hidden_size])?;
        checks::expect_shape("norm.bias", &bias, &[config.hidden_size])?;
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Constructs a LayerNorm initialised to the identity affine map (scale 1, bias 0).
    pub fn identity(config: NormConfig, device: &Device) -> Result<Self> {
        let weight = Tensor::ones(config.hidden_size, DType::F32, device)?;
        let bias = Tensor::zeros(config.hidden_size, DType::F32, device)?;
        Self::new(weight, bias, config)
    }

    pub fn config(&self) -> &NormConfig {
        &self.config
    }

    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("norm.input", hidden, self.config.hidden_size)?;

        let hidden_size = self.config.hidden_size as f64;
        let mean = (hidden.sum_keepdim(D::Minus1)? / hidden_size)?;
        let centered = hidden.broadcast_sub(&mean)?;
        let variance = (centered.sqr()?.sum_keepdim(D::Minus1)? / hidden_size)?;
        let denom = (variance + self.config.epsilon)?.sqrt()?;
        let normalized = centered.broadcast_div(&denom)?;

        Ok(normalized
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::ops;

    fn build_input(device: &Device, batch: usize, seq: usize, hidden: usize) -> Result<Tensor> {
        let total = batch * seq * hidden;
        let data = (0..total)
            .map(|i| (i as f32 * 0.25_f32) - 1.5_f32)
            .collect::<Vec<_>>();
        Ok(Tensor::from_vec(data, (batch, seq, hidden), device)?)
    }

    fn max_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
        Ok(a.sub(b)?.abs()?.max_all()?.to_vec0::<f32>()?)
    }

    #[test]
    fn layer_norm_matches_reference() -> Result<()> {
        let device = Device::Cpu;
        let hidden = 4;
        let config = NormConfig::new(hidden);

        let weight = Tensor::from_vec(vec![1.0f32, 0.5, -0.25, 1.5], (hidden,), &device)?;
        let bias = Tensor::from_vec(vec![0.1f32, -0.2, 0.05, 0.0], (hidden,), &device)?;
        let input = build_input(&device, 2, 3, hidden)?;
        let layer = LayerNorm::new(weight.clone(), bias.clone(), config.clone())?;
        let output = layer.forward(&input)?;

        assert_eq!(output.dims(), input.dims());
        let reference = ops::layer_norm(&input, &weight, &bias, config.epsilon as f32)?;
        let diff = max_diff(&output, &reference)?;
        assert!(diff < 5e-4, "max diff {diff}");
        Ok(())
    }

    #[test]
    fn identity_norm_has_zero_mean_unit_variance() -> Result<()> {
        let device = Device::Cpu;
        let layer = LayerNorm::identity(NormConfig::new(8), &device)?;
        let input = build_input(&device, 1, 3, 8)?;
        let output = layer.forward(&input)?;
        for row in output.squeeze(0)?.to_vec2::<f32>()? {
            let mean = row.iter().sum::<f32>() / row.len() as f32;
            let var = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / row.len() as f32;
            assert!(mean.abs() < 1e-5);
            assert!((var - 1.0).abs() < 1e-3);
        }
        Ok(())
    }

    #[test]
    fn layer_norm_handles_edge_shapes() -> Result<()> {
        let device = Device::Cpu;
        let shapes = [(1, 1, 1), (2, 1, 1), (1, 64, 8), (2, 3, 256)];
        for &(batch, seq, hidden) in &shapes {
            let config = NormConfig::new(hidden);
            let input = build_input(&device, batch, seq, hidden)?;
            let layer = LayerNorm::identity(config.clone(), &device)?;
            let output = layer.forward(&input)?;
            let weight = Tensor::ones((hidden,), DType::F32, &device)?;
            let bias = Tensor::zeros((hidden,), DType::F32, &device)?;
            let reference = ops::layer_norm(&input, &weight, &bias, config.epsilon as f32)?;
            let diff = max_diff(&output, &reference)?;
            assert!(diff < 5e-4, "shape {:?} diff {}", (batch, seq, hidden), diff);
        }
        Ok(())
    }

    #[test]
    fn rejects_wrong_hidden_size() -> Result<()> {
        let device = Device::Cpu;
        let layer = LayerNorm::identity(NormConfig::new(4), &device)?;
        let input = Tensor::zeros((1, 2, 3), DType::F32, &device)?;
        assert!(matches!(
            layer.forward(&input),
            Err(LayerError::InvalidShape(_))
        ));
        Ok(())
    }
}
