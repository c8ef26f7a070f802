//! Portable, exact scaled dot-product attention.
//!
//! This path favours clarity over absolute performance and operates on
//! head-split tensors; projections live in [`crate::multi_head`].

pub mod exact;

pub use exact::{ExactAttention, MASK_FILL};
