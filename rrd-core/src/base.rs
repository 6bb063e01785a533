//! Core functionalities.
mod agent;
mod env;
mod estimator;
mod policy;
mod step;
pub use agent::Agent;
pub use env::Env;
pub use estimator::{History, NoPredictor, PredictorNet, StateEstimator, ZeroFill};
pub use policy::Policy;
pub use step::Step;
