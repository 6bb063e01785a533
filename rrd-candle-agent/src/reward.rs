//! Reward redistribution (RRD).
//!
//! A per-transition reward model is regressed on trajectory-level labels: the
//! mean of its predictions over a random subset of transitions of an episode
//! should match the mean reward of that episode. The predictions replace the
//! environment rewards in the critic targets.
mod base;
mod config;
pub use base::RewardModel;
pub use config::RewardModelConfig;
