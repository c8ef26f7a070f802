//! Positional encodings.

pub mod sinusoidal;

pub use sinusoidal::{sinusoidal_table, PositionalTable, DEFAULT_MAX_LEN};
