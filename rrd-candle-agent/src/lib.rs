//! Soft actor-critic with reward redistribution and state prediction,
//! implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`sac_rrd::SacRrd`] implements [`rrd_core::Agent`]. Rewards used in the
//!   critic targets are predicted by a [`reward::RewardModel`] trained on
//!   trajectory-level returns.
//! * [`state_pred::SequencePredictor`] implements [`rrd_core::StateEstimator`]
//!   with a sequence model, [`seq::LstmAttn`] or [`seq::LastStepMlp`].
pub mod mlp;
pub mod model;
pub mod opt;
pub mod reward;
pub mod sac_rrd;
pub mod seq;
pub mod state_pred;
pub mod util;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl From<candle_core::Device> for Device {
    fn from(device: candle_core::Device) -> Self {
        match device {
            candle_core::Device::Cuda(_) => Self::Cuda(0),
            _ => Self::Cpu,
        }
    }
}

impl From<Device> for candle_core::Device {
    /// Falls back to CPU if the GPU is not available.
    fn from(device: Device) -> Self {
        match device {
            Device::Cpu => candle_core::Device::Cpu,
            Device::Cuda(n) => match candle_core::Device::new_cuda(n) {
                Ok(device) => device,
                Err(e) => {
                    warn!("CUDA device {} is not available, use CPU: {}", n, e);
                    candle_core::Device::Cpu
                }
            },
        }
    }
}
