//! Configuration of [`RewardModel`](super::RewardModel).
use crate::opt::OptimizerConfig;
use serde::{Deserialize, Serialize};

/// Configuration of [`RewardModel`](super::RewardModel).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RewardModelConfig<R> {
    /// Configuration of the model, which takes `(obs, act, obs - next_obs)`.
    pub model_config: Option<R>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Number of transitions drawn from each episode.
    pub sub_len: usize,

    /// Number of episodes per minibatch.
    pub num_subs: usize,
}

impl<R> Default for RewardModelConfig<R> {
    fn default() -> Self {
        Self {
            model_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.0003 },
            sub_len: 64,
            num_subs: 4,
        }
    }
}

impl<R> RewardModelConfig<R> {
    /// Sets the configuration of the model.
    pub fn model_config(mut self, v: R) -> Self {
        self.model_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the number of transitions drawn from each episode.
    pub fn sub_len(mut self, v: usize) -> Self {
        self.sub_len = v;
        self
    }

    /// Sets the number of episodes per minibatch.
    pub fn num_subs(mut self, v: usize) -> Self {
        self.num_subs = v;
        self
    }
}
