//! Policy.
use anyhow::Result;
use rand::rngs::StdRng;

/// A policy on an environment.
///
/// Policy is a mapping from an observation to an action. The mapping can be
/// either of deterministic or stochastic; stochastic policies draw their noise
/// from `rng`.
pub trait Policy {
    /// Sample an action given an observation.
    fn sample(&mut self, obs: &[f32], rng: &mut StdRng) -> Result<Vec<f32>>;
}
