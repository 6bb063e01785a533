//! State prediction from observation histories.
mod base;
mod config;
pub use base::SequencePredictor;
pub use config::SequencePredictorConfig;
