//! Boolean mask utilities shared by the encoder and decoder.
//!
//! All masks produced here have dtype [`MASK_DTYPE`] (`u8`). A value of `1`
//! marks a position that must not be attended to, `0` keeps it. Attention masks
//! are shaped `(batch, q_len, k_len)` and are broadcast across heads by the
//! kernel; causal masks are shaped `(q_len, k_len)` and broadcast across the
//! batch when combined.

pub mod causal;
pub mod padding;

use candle_core::{DType, Tensor};
use layers::{checks, LayerError, Result};

/// Dtype shared by all boolean masks.
pub const MASK_DTYPE: DType = DType::U8;

pub use causal::{causal_mask, offset_causal_mask};
pub use padding::{padding_flags, padding_mask};

/// Element-wise logical OR of two masks; `rhs` may broadcast against `lhs`.
///
/// Both operands are first reduced to strict `0/1` values, so inputs holding
/// arbitrary non-zero markers combine without overflow.
pub fn mask_or(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
    checks::expect_dtype("mask_or.lhs", lhs, MASK_DTYPE)?;
    checks::expect_dtype("mask_or.rhs", rhs, MASK_DTYPE)?;
    let lhs = lhs.ne(0u8)?;
    let rhs = rhs.ne(0u8)?;
    Ok(lhs.broadcast_maximum(&rhs)?)
}

/// Self-attention mask for full-sequence decoding: a key is hidden when it lies
/// in the future of the query, or when it is a padding position.
///
/// `causal_table` is a precomputed square causal mask at least `tgt_len` wide
/// and `tgt_pad` holds `(batch, tgt_len)` padding flags. Returns
/// `(batch, tgt_len, tgt_len)`.
pub fn decoder_self_mask(causal_table: &Tensor, tgt_pad: &Tensor) -> Result<Tensor> {
    checks::expect_rank("decoder_self_mask.tgt_pad", tgt_pad, 2)?;
    let (_, tgt_len) = tgt_pad.dims2()?;
    let (capacity, _) = causal_table.dims2()?;
    if tgt_len > capacity {
        return Err(LayerError::PositionOverflow {
            requested: tgt_len,
            capacity,
        });
    }
    let causal = causal_table.narrow(0, 0, tgt_len)?.narrow(1, 0, tgt_len)?;
    let pad = padding_mask(tgt_pad, tgt_len)?;
    mask_or(&pad, &causal)
}

#[cfg(test)]
mod tests;
