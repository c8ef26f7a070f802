//! Fixed sinusoidal positional table.
//!
//! Row `p` of the table holds `sin(p / 10000^(2i/dim))` in column `2i` and
//! `cos(p / 10000^(2i/dim))` in column `2i + 1`. Angles are evaluated in `f64`
//! and stored as `f32`. The table is computed once and never changes; callers
//! slice it by a `timestep` offset during incremental decoding.

use candle_core::{Device, Tensor};
use layers::{LayerError, Result};

/// Table length used when none is configured.
pub const DEFAULT_MAX_LEN: usize = 5000;

const BASE: f64 = 10_000.0;

/// Builds the `(max_len, embedding_dim)` sinusoidal table.
pub fn sinusoidal_table(embedding_dim: usize, max_len: usize, device: &Device) -> Result<Tensor> {
    if embedding_dim == 0 || embedding_dim % 2 != 0 {
        return Err(LayerError::InvalidConfiguration(format!(
            "positional encoding requires a positive even embedding_dim, got {embedding_dim}"
        )));
    }
    if max_len == 0 {
        return Err(LayerError::InvalidConfiguration(
            "positional encoding requires max_len > 0".into(),
        ));
    }

    let half = embedding_dim / 2;
    let scale = -(BASE.ln() / embedding_dim as f64);
    let div_term: Vec<f64> = (0..half)
        .map(|i| ((2 * i) as f64 * scale).exp())
        .collect();

    let mut data = Vec::with_capacity(max_len * embedding_dim);
    for position in 0..max_len {
        let p = position as f64;
        for freq in &div_term {
            let angle = p * freq;
            data.push(angle.sin() as f32);
            data.push(angle.cos() as f32);
        }
    }

    Ok(Tensor::from_vec(data, (max_len, embedding_dim), device)?)
}

/// Immutable positional table sliced by decoding timestep.
#[derive(Debug, Clone)]
pub struct PositionalTable {
    table: Tensor,
    max_len: usize,
    embedding_dim: usize,
}

impl PositionalTable {
    pub fn new(embedding_dim: usize, max_len: usize, device: &Device) -> Result<Self> {
        let table = sinusoidal_table(embedding_dim, max_len, device)?;
        Ok(Self {
            table,
            max_len,
            embedding_dim,
        })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Full `(max_len, embedding_dim)` table.
    pub fn table(&self) -> &Tensor {
        &self.table
    }

    /// Rows `[timestep, timestep + len)` shaped `(len, embedding_dim)`.
    pub fn slice(&self, timestep: usize, len: usize) -> Result<Tensor> {
        let requested = timestep.saturating_add(len);
        if requested > self.max_len {
            return Err(LayerError::PositionOverflow {
                requested,
                capacity: self.max_len,
            });
        }
        Ok(self.table.narrow(0, timestep, len)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_row_alternates_zero_and_one() -> Result<()> {
        let table = sinusoidal_table(6, 4, &Device::Cpu)?;
        let rows = table.to_vec2::<f32>()?;
        assert_eq!(rows[0], vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn odd_or_zero_dimensions_are_rejected() {
        for (dim, len) in [(5, 10), (0, 10), (4, 0)] {
            let err = sinusoidal_table(dim, len, &Device::Cpu).unwrap_err();
            assert!(matches!(err, LayerError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn slice_past_capacity_overflows() -> Result<()> {
        let table = PositionalTable::new(4, 8, &Device::Cpu)?;
        assert_eq!(table.slice(6, 2)?.dims(), &[2, 4]);
        let err = table.slice(6, 3).unwrap_err();
        assert!(matches!(
            err,
            LayerError::PositionOverflow {
                requested: 9,
                capacity: 8
            }
        ));
        Ok(())
    }
}
