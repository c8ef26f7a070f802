//! Lightweight validation helpers shared across layer components.
//!
//! These routines provide concise shape and dtype assertions that can be wired
//! into constructors or forward paths. They return [`crate::Result`] so call
//! sites can propagate [`LayerError::InvalidShape`] without panicking.

use candle_core::{DType, Tensor};

use crate::{LayerError, Result};

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(context: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(LayerError::InvalidShape(format!(
            "{context}: expected shape {expected:?}, got {actual:?}"
        )))
    }
}

/// Ensures a tensor has the given rank.
pub fn expect_rank(context: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    if tensor.rank() == rank {
        Ok(())
    } else {
        Err(LayerError::InvalidShape(format!(
            "{context}: expected rank {rank}, got {:?}",
            tensor.dims()
        )))
    }
}

/// Validates the `(batch, seq, hidden)` convention with a known hidden size and
/// returns the `(batch, seq)` pair.
pub fn expect_batch_seq_hidden(
    context: &str,
    tensor: &Tensor,
    hidden: usize,
) -> Result<(usize, usize)> {
    match tensor.dims() {
        [batch, seq, actual] if *actual == hidden => Ok((*batch, *seq)),
        dims => Err(LayerError::InvalidShape(format!(
            "{context}: expected (batch, seq, {hidden}) layout, got {dims:?}"
        ))),
    }
}

/// Checks the tensor dtype matches `expected`.
pub fn expect_dtype(context: &str, tensor: &Tensor, expected: DType) -> Result<()> {
    if tensor.dtype() == expected {
        Ok(())
    } else {
        Err(LayerError::InvalidShape(format!(
            "{context}: expected dtype {expected:?}, got {:?}",
            tensor.dtype()
        )))
    }
}
