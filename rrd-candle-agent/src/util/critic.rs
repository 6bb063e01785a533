//! Critic for agents with continuous action.
use crate::{
    model::SubModel2,
    opt::{Optimizer, OptimizerConfig},
    util::{init_seeded, track_with_replace_substring},
};
use anyhow::{Context, Result};
use candle_core::{DType::F32, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use rand::rngs::StdRng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`MultiCritic`].
pub struct MultiCriticConfig<Q> {
    /// The number of critic networks.
    pub n_nets: usize,

    /// Configuration of critic networks.
    pub q_config: Option<Q>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// Soft update coefficient.
    pub tau: f64,
}

impl<Q> Default for MultiCriticConfig<Q> {
    fn default() -> Self {
        Self {
            n_nets: 2,
            q_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.0003 },
            tau: 0.005,
        }
    }
}

impl<Q> MultiCriticConfig<Q>
where
    Q: DeserializeOwned + Serialize,
{
    /// Sets the number of critic networks.
    pub fn n_nets(mut self, v: usize) -> Self {
        self.n_nets = v;
        self
    }

    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets soft update parameter tau.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Constructs [`MultiCriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`MultiCriticConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Critic for agents with continuous action.
///
/// It takes observations and actions as inputs and outputs action values.
///
/// This struct has multiple q functions and corresponding target networks.
/// The optimizer owns the variables of the online networks only.
pub struct MultiCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize,
{
    tau: f64,
    varmap: VarMap,
    varmap_tgt: VarMap,
    qs: Vec<Q>,
    qs_tgt: Vec<Q>,
    opt: Optimizer,
}

impl<Q> MultiCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`MultiCritic`] with target networks equal to the online networks.
    ///
    /// Parameters of the online networks are drawn from `rng`.
    pub fn build(
        config: MultiCriticConfig<Q::Config>,
        device: Device,
        rng: &mut StdRng,
    ) -> Result<MultiCritic<Q>> {
        let tau = config.tau;
        let n_nets = config.n_nets;
        let q_config = config.q_config.context("q_config is not set.")?;

        // Critic networks
        let (varmap, qs) = Self::build_critic_networks(&q_config, &device, n_nets, "critic")?;
        init_seeded(&varmap, rng)?;

        // Target networks
        let (varmap_tgt, qs_tgt) =
            Self::build_critic_networks(&q_config, &device, n_nets, "critic_tgt")?;

        // Optimizer, shared with critic networks
        let opt = config.opt_config.build(varmap.all_vars())?;

        // Copy parameters
        track_with_replace_substring(&varmap_tgt, &varmap, 1.0, ("critic", "critic_tgt"))?;

        Ok(Self {
            tau,
            varmap,
            varmap_tgt,
            qs,
            qs_tgt,
            opt,
        })
    }

    fn build_critic_networks(
        q_config: &Q::Config,
        device: &Device,
        n_nets: usize,
        prefix: &str,
    ) -> Result<(VarMap, Vec<Q>)> {
        let varmap = VarMap::new();
        let qs = (0..n_nets)
            .map(|ix| {
                let vb = VarBuilder::from_varmap(&varmap, F32, device)
                    .set_prefix(format!("{}{}", prefix, ix));
                Q::build(vb, q_config.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((varmap, qs))
    }

    /// Moves the target networks toward the online networks by `tau`.
    pub fn soft_update(&mut self) -> Result<()> {
        track_with_replace_substring(
            &self.varmap_tgt,
            &self.varmap,
            self.tau,
            ("critic", "critic_tgt"),
        )
    }

    fn qvals_of(qs: &[Q], obs: &Tensor, act: &Tensor) -> Result<Vec<Tensor>> {
        qs.iter()
            .map(|critic| Ok(critic.forward(obs, act)?.squeeze(D::Minus1)?))
            .collect()
    }

    fn min_of(qvals: &[Tensor]) -> Result<Tensor> {
        // [n_nets, batch_size] -> [batch_size]
        Ok(Tensor::stack(qvals, 0)?.min(0)?)
    }

    /// Returns action values of all critics, each of shape `(batch_size,)`.
    pub fn qvals(&self, obs: &Tensor, act: &Tensor) -> Result<Vec<Tensor>> {
        Self::qvals_of(&self.qs, obs, act)
    }

    /// Returns minimum action values of all critics.
    pub fn qvals_min(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        Self::min_of(&self.qvals(obs, act)?)
    }

    /// Returns minimum action values of all target critics.
    pub fn qvals_min_tgt(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        Self::min_of(&Self::qvals_of(&self.qs_tgt, obs, act)?)
    }

    /// Backward step for all variables in critic networks.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Save variables to prefix + ".safetensors" and + ".tgt.safetensors".
    pub fn save<T: AsRef<Path>>(&self, prefix: T) -> Result<(PathBuf, PathBuf)> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("safetensors");
        self.varmap.save(&path)?;
        info!("Save critics to {:?}", path);

        let mut path_tgt = PathBuf::from(prefix.as_ref());
        path_tgt.set_extension("tgt.safetensors");
        self.varmap_tgt.save(&path_tgt)?;
        info!("Save target critics to {:?}", path_tgt);

        Ok((path, path_tgt))
    }

    /// Load variables from prefix + ".safetensors" and + ".tgt.safetensors".
    pub fn load<T: AsRef<Path>>(&mut self, prefix: T) -> Result<()> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("safetensors");
        self.varmap.load(&path)?;
        info!("Load critics from {:?}", path);

        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("tgt.safetensors");
        self.varmap_tgt.load(&path)?;
        info!("Load target critics from {:?}", path);

        Ok(())
    }
}
