//! Sequence-to-sequence transformer assembled from the workspace crates.
//!
//! [`Encoder`] and [`Decoder`] are usable on their own; [`Transformer`] wires
//! them together and derives padding flags from token ids.

pub mod cache;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod model;

pub use cache::DecodeCache;
pub use config::ModelConfig;
pub use decoder::{Decoder, DecoderLayer};
pub use encoder::{Encoder, EncoderLayer};
pub use model::{EncoderOutput, Transformer};
