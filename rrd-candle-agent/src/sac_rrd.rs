//! Soft actor-critic (SAC) agent with reward redistribution.
mod base;
mod config;
mod ent_coef;
pub use base::SacRrd;
pub use config::SacRrdConfig;
pub use ent_coef::{EntCoef, EntCoefMode};
