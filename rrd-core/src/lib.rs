#![warn(missing_docs)]
//! Core components of soft actor-critic with reward redistribution under
//! partial observability.
//!
//! * [`trajectory_buffer`] stores episodes and draws the batches of all learners.
//! * [`observability`] hides parts of observations and fills them with beliefs.
//! * [`Trainer`] interleaves rollouts, state prediction, reward redistribution
//!   and actor-critic updates.
//!
//! Neural network components are provided by backend crates through the
//! [`Agent`] and [`StateEstimator`] traits.
pub mod dummy;
pub mod error;
pub mod evaluator;
pub mod observability;
pub mod record;
pub mod trajectory_buffer;
pub mod util;

mod base;
pub use base::{
    Agent, Env, History, NoPredictor, Policy, PredictorNet, StateEstimator, Step, ZeroFill,
};
pub use evaluator::{Evaluator, PartialObsEvaluator};

mod trainer;
pub use trainer::{RolloutSampler, Trainer, TrainerConfig, TrainerState};
