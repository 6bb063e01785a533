//! Configuration of [`Trainer`](super::Trainer).
use crate::{
    observability::ObservabilityFilterConfig, trajectory_buffer::TrajectoryBufferConfig,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The number of outer iterations.
    pub num_steps: usize,

    /// Environment steps per iteration.
    pub env_steps: usize,

    /// Agent minibatch updates per iteration.
    pub train_batches: usize,

    /// Transitions required before the state predictor is trained.
    pub start_learning_state: usize,

    /// Transitions required before reward redistribution and SAC are trained.
    pub start_learning: usize,

    /// Interval of evaluation in iterations.
    pub eval_interval: usize,

    /// Number of evaluation episodes.
    pub n_eval_episodes: usize,

    /// Maximum number of `(obs, act)` pairs given to the state estimator.
    pub context: usize,

    /// Capacity of the trajectory buffer in transitions.
    pub buffer_capacity: usize,

    /// Masking of observations.
    pub filter_config: ObservabilityFilterConfig,

    /// Iteration at which the value functions of the agent are re-initialized.
    pub policy_reset_step: Option<usize>,

    /// Seed of the random number generator shared by all stochastic draws.
    pub seed: u64,

    /// Where the best parameters are saved.
    pub model_dir: Option<String>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_steps: 40_000,
            env_steps: 100,
            train_batches: 100,
            start_learning_state: 10_000,
            start_learning: 1_000_000,
            eval_interval: 50,
            n_eval_episodes: 10,
            context: 20,
            buffer_capacity: 1_000_000,
            filter_config: ObservabilityFilterConfig::default(),
            policy_reset_step: None,
            seed: 1,
            model_dir: None,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of iterations.
    pub fn num_steps(mut self, v: usize) -> Self {
        self.num_steps = v;
        self
    }

    /// Sets the number of environment steps per iteration.
    pub fn env_steps(mut self, v: usize) -> Self {
        self.env_steps = v;
        self
    }

    /// Sets the number of minibatch updates per iteration.
    pub fn train_batches(mut self, v: usize) -> Self {
        self.train_batches = v;
        self
    }

    /// Sets the warmup of the state predictor.
    pub fn start_learning_state(mut self, v: usize) -> Self {
        self.start_learning_state = v;
        self
    }

    /// Sets the warmup of reward redistribution and SAC.
    pub fn start_learning(mut self, v: usize) -> Self {
        self.start_learning = v;
        self
    }

    /// Sets the interval of evaluation in iterations.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the number of evaluation episodes.
    pub fn n_eval_episodes(mut self, v: usize) -> Self {
        self.n_eval_episodes = v;
        self
    }

    /// Sets the length of the history.
    pub fn context(mut self, v: usize) -> Self {
        self.context = v;
        self
    }

    /// Sets the capacity of the trajectory buffer.
    pub fn buffer_capacity(mut self, v: usize) -> Self {
        self.buffer_capacity = v;
        self
    }

    /// Sets the configuration of the observability filter.
    pub fn filter_config(mut self, v: ObservabilityFilterConfig) -> Self {
        self.filter_config = v;
        self
    }

    /// Sets the iteration at which the value functions are reset.
    pub fn policy_reset_step(mut self, v: Option<usize>) -> Self {
        self.policy_reset_step = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the directory where the best parameters are saved.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Configuration of the trajectory buffer.
    pub fn buffer_config(&self) -> TrajectoryBufferConfig {
        TrajectoryBufferConfig::default()
            .capacity(self.buffer_capacity)
            .context(self.context)
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .num_steps(10)
            .filter_config(ObservabilityFilterConfig::default().num_hidden(2))
            .policy_reset_step(Some(5))
            .model_dir("some/directory");

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
