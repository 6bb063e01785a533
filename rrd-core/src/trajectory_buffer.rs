//! Episode storage and sampling.
//!
//! Finished episodes are stored as [`Trajectory`] objects in a
//! [`TrajectoryBuffer`], which provides three sampling modes:
//!
//! * [`TrajectoryBuffer::sample_transitions`] for actor-critic updates,
//! * [`TrajectoryBuffer::sample_sub_sequences`] for reward redistribution,
//! * [`TrajectoryBuffer::sample_state_prediction_batch`] for the state predictor.
mod base;
mod batch;
mod config;
mod trajectory;
pub use base::TrajectoryBuffer;
pub use batch::{
    StateFeatures, StatePredictionBatch, SubSequence, SubSequenceBatch, SubSequenceOf,
    Transition, TransitionBatch,
};
pub use config::TrajectoryBufferConfig;
pub use trajectory::Trajectory;
