//! Scaled dot-product multi-head attention for the encoder/decoder stacks.
//!
//! Hidden states use the `(batch, seq, model_dim)` layout; internally the
//! projections are split into `[batch, n_heads, seq_len, head_dim]` before the
//! exact kernel in [`reference`] computes the attention weights.
//!
//! Masks are boolean `u8` tensors shaped `(batch, q_len, k_len)` where `1`
//! suppresses a key position. They are broadcast across heads and turn the
//! corresponding scores into a large negative sentinel before the softmax.
//!
//! Dropout on the attention weights follows the caller's
//! [`ExecutionMode`](layers::ExecutionMode) and is the identity at inference.

pub mod core;
pub mod masks;
pub mod multi_head;
pub mod reference;

pub use self::core::AttentionConfig;
pub use multi_head::MultiHeadAttention;
pub use reference::ExactAttention;
