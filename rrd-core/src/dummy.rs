//! Types used in tests.
use crate::{
    observability::BodyPartition,
    record::Record,
    trajectory_buffer::TrajectoryBuffer,
    Agent, Env, History, Policy, PredictorNet, StateEstimator, Step,
};
use anyhow::Result;
use rand::rngs::StdRng;
use std::path::Path;

/// Configuration of [`CountingEnv`].
#[derive(Clone, Debug)]
pub struct CountingEnvConfig {
    episode_len: usize,
    terminate: bool,
}

impl Default for CountingEnvConfig {
    fn default() -> Self {
        Self {
            episode_len: 10,
            terminate: false,
        }
    }
}

impl CountingEnvConfig {
    /// Sets the number of steps of an episode.
    pub fn episode_len(mut self, v: usize) -> Self {
        self.episode_len = v;
        self
    }

    /// If `true` episodes terminate, otherwise they are truncated.
    pub fn terminate(mut self, v: bool) -> Self {
        self.terminate = v;
        self
    }
}

/// Observes `[t, -t]` at step `t` and pays 1 per step.
pub struct CountingEnv {
    config: CountingEnvConfig,
    t: usize,
}

impl Env for CountingEnv {
    type Config = CountingEnvConfig;

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            t: 0,
        })
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.t = 0;
        Ok(vec![0.0, 0.0])
    }

    fn step(&mut self, _act: &[f32]) -> Result<(Step, Record)> {
        self.t += 1;
        let t = self.t as f32;
        let end = self.t >= self.config.episode_len;
        let step = Step::new(
            vec![t, -t],
            1.0,
            end && self.config.terminate,
            end && !self.config.terminate,
        );
        Ok((step, Record::empty()))
    }

    fn obs_dim(&self) -> usize {
        2
    }

    fn act_dim(&self) -> usize {
        1
    }

    fn action_scale(&self) -> Vec<f32> {
        vec![1.0]
    }

    fn partition(&self) -> BodyPartition {
        BodyPartition::new(vec![vec![0], vec![1]])
    }
}

/// Always takes action `[0]`.
pub struct ZeroPolicy;

impl Policy for ZeroPolicy {
    fn sample(&mut self, _obs: &[f32], _rng: &mut StdRng) -> Result<Vec<f32>> {
        Ok(vec![0.0])
    }
}

/// An agent counting the calls of its methods.
pub struct DummyAgent {
    train: bool,
    /// Number of optimization steps.
    pub n_opts: usize,
    /// Number of value function resets.
    pub n_resets: usize,
    /// Number of actions sampled in evaluation mode.
    pub n_eval_samples: usize,
}

impl Default for DummyAgent {
    fn default() -> Self {
        Self {
            train: true,
            n_opts: 0,
            n_resets: 0,
            n_eval_samples: 0,
        }
    }
}

impl Policy for DummyAgent {
    fn sample(&mut self, _obs: &[f32], _rng: &mut StdRng) -> Result<Vec<f32>> {
        if !self.train {
            self.n_eval_samples += 1;
        }
        Ok(vec![0.0])
    }
}

impl Agent for DummyAgent {
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt_with_record(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<Record> {
        let batch = buffer.sample_transitions(4, rng)?;
        self.n_opts += 1;
        Ok(Record::from_scalar("loss_dummy", batch.len() as f32))
    }

    fn reset_value_functions(&mut self) -> Result<()> {
        self.n_resets += 1;
        Ok(())
    }

    fn save_params(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load_params(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// An enabled estimator predicting no change, counting its updates.
#[derive(Default)]
pub struct DummyEstimator {
    /// Number of training calls.
    pub n_opts: usize,
    /// Number of soft updates.
    pub n_soft_updates: usize,
}

impl StateEstimator for DummyEstimator {
    fn is_enabled(&self) -> bool {
        true
    }

    fn predict_delta(&self, history: &History, _net: PredictorNet) -> Result<Vec<f32>> {
        Ok(vec![0.0; history.last_obs()?.len()])
    }

    fn opt_with_record(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<Record> {
        let batch = buffer.sample_state_prediction_batch(4, rng)?;
        self.n_opts += 1;
        Ok(Record::from_scalar("loss_state", batch.len() as f32))
    }

    fn soft_update(&mut self) -> Result<()> {
        self.n_soft_updates += 1;
        Ok(())
    }

    fn save_params(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load_params(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
