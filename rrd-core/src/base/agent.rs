//! Agent.
use super::Policy;
use crate::{record::Record, trajectory_buffer::TrajectoryBuffer};
use anyhow::Result;
use rand::rngs::StdRng;
use std::path::Path;

/// Represents a trainable policy on an environment.
pub trait Agent: Policy {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs an optimization step.
    fn opt(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<()> {
        self.opt_with_record(buffer, rng).map(|_| ())
    }

    /// Performs an optimization step on a minibatch and returns losses.
    fn opt_with_record(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<Record>;

    /// Re-initializes the value functions and their optimizers, keeping the policy.
    fn reset_value_functions(&mut self) -> Result<()>;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
