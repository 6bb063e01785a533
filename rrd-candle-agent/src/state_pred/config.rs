//! Configuration of [`SequencePredictor`](super::SequencePredictor).
use crate::{
    opt::{GradClip, OptimizerConfig},
    Device,
};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`SequencePredictor`](super::SequencePredictor).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SequencePredictorConfig<C> {
    /// Configuration of the sequence model.
    pub model_config: Option<C>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Number of samples in a minibatch.
    pub batch_size: usize,

    /// Number of minibatches per optimization step.
    pub n_batches: usize,

    /// Soft update coefficient of the target parameters.
    pub tau: f64,

    /// Gradient clipping.
    pub grad_clip: GradClip,

    /// Seed of the initial parameters.
    pub seed: u64,

    /// Device of the model.
    pub device: Option<Device>,
}

impl<C> Default for SequencePredictorConfig<C> {
    fn default() -> Self {
        Self {
            model_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.001 },
            batch_size: 100 * 256 / 4,
            n_batches: 4,
            tau: 0.005,
            grad_clip: GradClip::Value(1.0),
            seed: 1,
            device: None,
        }
    }
}

impl<C> SequencePredictorConfig<C>
where
    C: DeserializeOwned + Serialize,
{
    /// Sets the configuration of the sequence model.
    pub fn model_config(mut self, v: C) -> Self {
        self.model_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the minibatch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the number of minibatches per optimization step.
    pub fn n_batches(mut self, v: usize) -> Self {
        self.n_batches = v;
        self
    }

    /// Sets the soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Sets gradient clipping.
    pub fn grad_clip(mut self, v: GradClip) -> Self {
        self.grad_clip = v;
        self
    }

    /// Sets the seed of the initial parameters.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, device: candle_core::Device) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Constructs [`SequencePredictorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of state predictor from {:?}", path_);
        Ok(b)
    }

    /// Saves [`SequencePredictorConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of state predictor into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::seq::LstmAttnConfig;
    use tempdir::TempDir;

    #[test]
    fn test_serde_config() -> Result<()> {
        let config = SequencePredictorConfig::default()
            .model_config(LstmAttnConfig::new(5, 3))
            .batch_size(32)
            .seed(9)
            .grad_clip(GradClip::Norm(0.5));
        let dir = TempDir::new("state_pred")?;
        let path = dir.path().join("config.yaml");

        config.save(&path)?;
        let config_ = SequencePredictorConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
