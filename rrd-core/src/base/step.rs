//! Environment step.

/// Outcome of an environment step: `(o_t+1, r_t)` and how the episode ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation after the step.
    pub obs: Vec<f32>,

    /// Reward.
    pub reward: f32,

    /// The episode reached an absorbing state.
    pub is_terminated: bool,

    /// The episode was cut off by a time limit.
    pub is_truncated: bool,
}

impl Step {
    /// Constructs a [`Step`] object.
    pub fn new(obs: Vec<f32>, reward: f32, is_terminated: bool, is_truncated: bool) -> Self {
        Self {
            obs,
            reward,
            is_terminated,
            is_truncated,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }

    /// Done flag stored in trajectories.
    ///
    /// Truncation takes precedence: a time-limit cutoff is not terminal for
    /// bootstrapping even if the environment also reports termination.
    pub fn done_flag(&self) -> f32 {
        match (self.is_terminated, self.is_truncated) {
            (_, true) => 0.0,
            (true, false) => 1.0,
            (false, false) => 0.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_done_flag() {
        let step = |term, trunc| Step::new(vec![], 0.0, term, trunc);
        assert_eq!(step(true, false).done_flag(), 1.0);
        assert_eq!(step(false, true).done_flag(), 0.0);
        assert_eq!(step(true, true).done_flag(), 0.0);
        assert_eq!(step(false, false).done_flag(), 0.0);
        assert!(step(false, true).is_done());
        assert!(!step(false, false).is_done());
    }
}
