//! Linear and affine projection helpers.
//!
//! Linear layers expect inputs shaped `(batch, seq, in_dim)` or `(rows, in_dim)`
//! and return the same leading dimensions with `out_dim` features. Fused
//! variants pack the output as `(batch, seq, fused_projections * output_dim)` so
//! that callers can split them for attention (`qkv`, `kv`). Weights are stored
//! as `(out_features, in_features)` and applied as `y = x Wᵀ + b`.

use candle_core::{Device, Tensor};
use rand::{distributions::Distribution, rngs::StdRng};
use rand_distr::Uniform;

use crate::{checks, ensure_positive, LayerError, Result};

/// Configuration shared by dense projection layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// Incoming feature dimension.
    pub input_dim: usize,
    /// Output feature dimension per projection shard.
    pub output_dim: usize,
    /// Whether a learnable bias vector should be applied.
    pub bias: bool,
    /// Number of projections fused together (1 for standard linear).
    pub fused_projections: usize,
}

impl LinearConfig {
    /// Creates a configuration for a single projection layer.
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            bias: true,
            fused_projections: 1,
        }
    }

    /// Creates a configuration packing `count` projections of `output_dim` each.
    pub fn fused(input_dim: usize, output_dim: usize, count: usize) -> Self {
        Self {
            fused_projections: count,
            ..Self::new(input_dim, output_dim)
        }
    }

    /// Total number of output features produced by the layer.
    pub fn total_output_dim(&self) -> usize {
        self.output_dim * self.fused_projections
    }

    fn validate(&self) -> Result<()> {
        ensure_positive("linear input_dim", self.input_dim)?;
        ensure_positive("linear output_dim", self.output_dim)?;
        ensure_positive("linear fused_projections", self.fused_projections)
    }
}

/// Supported weight initialisation policies for transformer projections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearInit {
    /// Xavier/Glorot uniform initialisation, `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
}

impl LinearInit {
    /// Samples an `(out_dim, in_dim)` weight matrix from `rng`.
    pub fn sample(
        &self,
        shape: (usize, usize),
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Tensor> {
        let (out_dim, in_dim) = shape;
        let (fan_in, fan_out) = (in_dim as f64, out_dim as f64);
        let total = out_dim * in_dim;
        let data: Vec<f32> = match self {
            LinearInit::XavierUniform => {
                let bound = (6.0f64 / (fan_in + fan_out)).sqrt() as f32;
                let dist = Uniform::new_inclusive(-bound, bound);
                dist.sample_iter(&mut *rng).take(total).collect()
            }
        };
        Ok(Tensor::from_vec(data, shape, device)?)
    }
}

/// Dense affine projection with optional bias.
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    weight: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    /// Constructs a linear layer from pre-existing parameters.
    pub fn new(config: LinearConfig, weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        config.validate()?;
        Self::validate_weight(&config, &weight)?;
        Self::validate_bias(&config, bias.as_ref())?;
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Builds a linear layer with weights sampled from `init` and zero biases.
    pub fn with_init(
        config: LinearConfig,
        init: &LinearInit,
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;
        let weight = init.sample((config.total_output_dim(), config.input_dim), rng, device)?;
        let bias = if config.bias {
            Some(Tensor::zeros(
                config.total_output_dim(),
                candle_core::DType::F32,
                device,
            )?)
        } else {
            None
        };
        Self::new(config, weight, bias)
    }

    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    /// Returns the `(out_features, in_features)` weight tensor.
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    fn validate_weight(config: &LinearConfig, weight: &Tensor) -> Result<()> {
        checks::expect_shape(
            "linear.weight",
            weight,
            &[config.total_output_dim(), config.input_dim],
        )?;
        checks::expect_dtype("linear.weight", weight, candle_core::DType::F32)
    }

    fn validate_bias(config: &LinearConfig, bias: Option<&Tensor>) -> Result<()> {
        match (config.bias, bias) {
            (true, Some(tensor)) => {
                checks::expect_shape("linear.bias", tensor, &[config.total_output_dim()])?;
                checks::expect_dtype("linear.bias", tensor, candle_core::DType::F32)
            }
            (false, Some(_)) => Err(LayerError::config("bias provided but config disables bias")),
            (true, None) => Err(LayerError::config("config expects bias but none supplied")),
            (false, None) => Ok(()),
        }
    }

    /// Applies `y = x Wᵀ + b` over the last dimension.
    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        let in_dim = self.config.input_dim;
        let out_dim = self.config.total_output_dim();
        let weight_t = self.weight.t()?;

        let output = match hidden.dims() {
            [batch, seq, hidden_dim] if *hidden_dim == in_dim => {
                let flat = hidden.reshape((*batch * *seq, in_dim))?;
                flat.matmul(&weight_t)?.reshape((*batch, *seq, out_dim))?
            }
            [_, hidden_dim] if *hidden_dim == in_dim => hidden.matmul(&weight_t)?,
            dims => {
                return Err(LayerError::InvalidShape(format!(
                    "linear expects input shaped [B, T, {in_dim}] or [T, {in_dim}], got {dims:?}"
                )))
            }
        };

        match &self.bias {
            Some(bias) => Ok(output.broadcast_add(bias)?),
            None => Ok(output),
        }
    }
}
