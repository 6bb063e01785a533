//! A chain of point masses implementing [`rrd_core::Env`].
//!
//! Each mass is a body part; hiding a part hides its position and velocity.
mod config;
mod env;
pub use config::PointMassConfig;
pub use env::PointMassEnv;
