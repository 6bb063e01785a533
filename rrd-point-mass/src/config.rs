//! Configuration of [`PointMassEnv`](super::PointMassEnv).
use serde::{Deserialize, Serialize};

/// Configuration of [`PointMassEnv`](super::PointMassEnv).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PointMassConfig {
    /// Number of masses, each one is a body part.
    pub n_masses: usize,

    /// Steps after which an episode is truncated.
    pub max_steps: usize,

    /// Integration step.
    pub dt: f32,

    /// Spring constant pulling masses to the origin.
    pub stiffness: f32,

    /// Velocity damping.
    pub damping: f32,

    /// Position every mass should reach.
    pub goal: f32,

    /// An episode terminates when a mass leaves `[-bound, bound]`.
    pub bound: f32,

    /// Maximum absolute force of an action component.
    pub max_force: f32,

    /// Pays the return of an episode at its last step only.
    pub delayed_reward: bool,
}

impl Default for PointMassConfig {
    fn default() -> Self {
        Self {
            n_masses: 3,
            max_steps: 200,
            dt: 0.05,
            stiffness: 0.5,
            damping: 0.1,
            goal: 1.0,
            bound: 5.0,
            max_force: 2.0,
            delayed_reward: false,
        }
    }
}

impl PointMassConfig {
    /// Sets the number of masses.
    pub fn n_masses(mut self, v: usize) -> Self {
        self.n_masses = v;
        self
    }

    /// Sets the maximum number of steps of an episode.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the termination bound of positions.
    pub fn bound(mut self, v: f32) -> Self {
        self.bound = v;
        self
    }

    /// Sets if rewards are delayed to the end of episodes.
    pub fn delayed_reward(mut self, v: bool) -> Self {
        self.delayed_reward = v;
        self
    }
}
