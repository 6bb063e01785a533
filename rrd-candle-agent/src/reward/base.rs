use super::RewardModelConfig;
use crate::{
    model::SubModel1,
    opt::Optimizer,
    util::{init_seeded, rows, scalar},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{loss::mse, VarBuilder, VarMap};
use log::info;
use rand::rngs::StdRng;
use rrd_core::trajectory_buffer::TrajectoryBuffer;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// Per-transition reward model trained with trajectory-level labels.
pub struct RewardModel<R>
where
    R: SubModel1<Input = Tensor, Output = Tensor>,
    R::Config: DeserializeOwned + Serialize,
{
    device: Device,
    varmap: VarMap,
    model: R,
    opt: Optimizer,
    sub_len: usize,
    num_subs: usize,
}

impl<R> RewardModel<R>
where
    R: SubModel1<Input = Tensor, Output = Tensor>,
    R::Config: DeserializeOwned + Serialize,
{
    /// Constructs [`RewardModel`] with parameters drawn from `rng`.
    pub fn build(config: RewardModelConfig<R::Config>, device: Device, rng: &mut StdRng) -> Result<Self> {
        let model_config = config.model_config.context("model_config is not set.")?;
        let varmap = VarMap::new();
        let model = R::build(
            VarBuilder::from_varmap(&varmap, DType::F32, &device).set_prefix("rrd"),
            model_config,
        )?;
        init_seeded(&varmap, rng)?;
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            model,
            opt,
            sub_len: config.sub_len,
            num_subs: config.num_subs,
        })
    }

    /// Features `(obs, act, obs - next_obs)` of transitions, `(n, 2 * obs_dim + act_dim)`.
    pub fn features(obs: &Tensor, act: &Tensor, next_obs: &Tensor) -> Result<Tensor> {
        Ok(Tensor::cat(&[obs, act, &(obs - next_obs)?], D::Minus1)?)
    }

    /// Predicted rewards of transitions, `(n,)`.
    pub fn predict(&self, obs: &Tensor, act: &Tensor, next_obs: &Tensor) -> Result<Tensor> {
        let feats = Self::features(obs, act, next_obs)?;
        Ok(self.model.forward(&feats)?.squeeze(D::Minus1)?)
    }

    /// One update on sub-sequences of the buffer, returns the loss.
    ///
    /// Predictions are averaged within each sub-sequence and regressed on the
    /// mean reward of the episode the sub-sequence was drawn from.
    pub fn update(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<f32> {
        let batch = buffer.sample_sub_sequences(self.sub_len, self.num_subs, rng)?;
        let (n_subs, len) = (batch.n_subs(), batch.len);
        let n = n_subs * len;
        let obs = rows(&batch.obs, n, batch.obs_dim, &self.device)?;
        let act = rows(&batch.act, n, batch.act_dim, &self.device)?;
        let next_obs = rows(&batch.next_obs, n, batch.obs_dim, &self.device)?;
        let labels = Tensor::from_slice(&batch.reward, (n_subs,), &self.device)?;

        let r_hat = self.predict(&obs, &act, &next_obs)?.reshape((n_subs, len))?;
        let episodic_means = r_hat.mean(1)?;
        let loss = mse(&episodic_means, &labels)?;
        self.opt.backward_step(&loss)?;

        scalar(&loss)
    }

    /// Save variables to prefix + ".safetensors".
    pub fn save(&self, prefix: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("safetensors");
        self.varmap.save(&path)?;
        info!("Save reward model to {:?}", path);
        Ok(path)
    }

    /// Load variables from prefix + ".safetensors".
    pub fn load(&mut self, prefix: impl AsRef<Path>) -> Result<()> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("safetensors");
        self.varmap.load(&path)?;
        info!("Load reward model from {:?}", path);
        Ok(())
    }
}
