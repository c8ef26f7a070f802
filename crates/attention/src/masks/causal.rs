//! Builders for causal attention masks.
//!
//! The resulting tensors have dtype [`MASK_DTYPE`](super::MASK_DTYPE) and shape
//! `(q_len, k_len)`. Entries are `1` where the key lies in the future of the
//! query and `0` otherwise.

use candle_core::{Device, Tensor};
use layers::Result;

/// Strict upper-triangular `(len, len)` mask: position `(q, k)` is masked when `k > q`.
pub fn causal_mask(device: &Device, len: usize) -> Result<Tensor> {
    offset_causal_mask(device, len, len)
}

/// Causal mask for `q_len` queries against `k_len` keys.
///
/// When `k_len > q_len`, queries are assumed to align with the most recent
/// `q_len` keys, allowing access to the extended prefix.
pub fn offset_causal_mask(device: &Device, q_len: usize, k_len: usize) -> Result<Tensor> {
    let offset = k_len.saturating_sub(q_len);
    let mut data = vec![0u8; q_len * k_len];
    for q in 0..q_len {
        let max_k = q + offset;
        let row = &mut data[q * k_len..(q + 1) * k_len];
        for (k, value) in row.iter_mut().enumerate() {
            if k > max_k {
                *value = 1;
            }
        }
    }
    Ok(Tensor::from_vec(data, (q_len, k_len), device)?)
}
