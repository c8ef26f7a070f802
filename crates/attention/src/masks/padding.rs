//! Builders for padding flags and the masks derived from them.
//!
//! Padding flags are `(batch, len)` tensors of dtype
//! [`MASK_DTYPE`](super::MASK_DTYPE) where `1` marks a pad position.

use candle_core::{DType, Tensor};
use layers::{checks, LayerError, Result};

use super::MASK_DTYPE;

/// Flags every position of `token_ids` equal to `padding_idx`.
pub fn padding_flags(token_ids: &Tensor, padding_idx: usize) -> Result<Tensor> {
    checks::expect_rank("padding_flags.token_ids", token_ids, 2)?;
    if !token_ids.dtype().is_int() {
        return Err(LayerError::InvalidShape(format!(
            "padding_flags expects integer token ids, got {:?}",
            token_ids.dtype()
        )));
    }
    Ok(token_ids.to_dtype(DType::I64)?.eq(padding_idx as i64)?)
}

/// Broadcasts `(batch, k_len)` padding flags across `q_len` queries,
/// returning a `(batch, q_len, k_len)` mask.
pub fn padding_mask(pad: &Tensor, q_len: usize) -> Result<Tensor> {
    checks::expect_rank("padding_mask.pad", pad, 2)?;
    checks::expect_dtype("padding_mask.pad", pad, MASK_DTYPE)?;
    let (batch, k_len) = pad.dims2()?;
    Ok(pad
        .unsqueeze(1)?
        .broadcast_as((batch, q_len, k_len))?
        .contiguous()?)
}
