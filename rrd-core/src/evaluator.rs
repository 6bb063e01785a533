//! Evaluate a policy.
use crate::{record::Record, Policy, StateEstimator};
use anyhow::Result;
use rand::rngs::StdRng;
mod partial_obs_evaluator;
pub use partial_obs_evaluator::PartialObsEvaluator;

/// Evaluate a policy.
pub trait Evaluator {
    /// Runs evaluation episodes and returns their statistics.
    ///
    /// The caller of this method needs to handle the internal state of the
    /// policy, like training/evaluation mode.
    fn evaluate<P, S>(&mut self, policy: &mut P, estimator: &S, rng: &mut StdRng) -> Result<Record>
    where
        P: Policy + ?Sized,
        S: StateEstimator + ?Sized;
}
