//! Environment.
use super::Step;
use crate::{observability::BodyPartition, record::Record};
use anyhow::Result;

/// Represents an environment with continuous observations and actions.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Performes an environment step.
    fn step(&mut self, act: &[f32]) -> Result<(Step, Record)>;

    /// Dimension of observations.
    fn obs_dim(&self) -> usize;

    /// Dimension of actions.
    fn act_dim(&self) -> usize;

    /// Half of the range of each action component, `(high - low) / 2`.
    fn action_scale(&self) -> Vec<f32>;

    /// Body parts of the observation that are hidden together.
    fn partition(&self) -> BodyPartition;
}
