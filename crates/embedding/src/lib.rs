//! Embedding crate
//!
//! Token lookup tables plus the fixed sinusoidal positional table that is added
//! to them before the encoder and decoder stacks.

pub mod positional;
pub mod token;

pub use positional::*;
pub use token::*;
