//! Encoder-decoder transformer core.
//!
//! The workspace crates are re-exported under their own names; the most used
//! types are also available at the top level.

pub use attention;
pub use embedding;
pub use layers;
pub use model;

pub use layers::{ExecutionMode, LayerError, Result};
pub use model::{DecodeCache, EncoderOutput, ModelConfig, Transformer};

use candle_core::Device;

/// Picks the device a [`ModelConfig`] should be built on: CUDA when available,
/// the CPU otherwise or when `CANDLE_FORCE_CPU` is set.
pub fn select_device() -> Result<Device> {
    if std::env::var_os("CANDLE_FORCE_CPU").is_some() {
        log::info!("CANDLE_FORCE_CPU set, using CPU backend");
        return Ok(Device::Cpu);
    }
    match Device::cuda_if_available(0) {
        Ok(device) if device.is_cuda() => {
            log::info!("CUDA device selected: {device:?}");
            Ok(device)
        }
        Ok(_) => {
            log::info!("using CPU backend");
            Ok(Device::Cpu)
        }
        Err(err) => {
            log::warn!("CUDA probe failed ({err}), using CPU backend");
            Ok(Device::Cpu)
        }
    }
}
