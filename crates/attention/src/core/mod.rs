//! Configuration shared by the attention components.

pub mod config;

pub use config::AttentionConfig;
