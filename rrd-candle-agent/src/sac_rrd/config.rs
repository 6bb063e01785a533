//! Configuration of SAC agent with reward redistribution.
use super::EntCoefMode;
use crate::{
    model::{SubModel1, SubModel2},
    reward::RewardModelConfig,
    util::{actor::GaussianActorConfig, critic::MultiCriticConfig, OutDim},
    Device,
};
use anyhow::Result;
use candle_core::Tensor;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`SacRrd`](super::SacRrd).
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct SacRrdConfig<Q, P, R>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    R: SubModel1<Output = Tensor>,
    R::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Configuration of the actor model.
    pub actor_config: GaussianActorConfig<P::Config>,

    /// Configuration of the critic model.
    pub critic_config: MultiCriticConfig<Q::Config>,

    /// Configuration of the reward model.
    pub reward_config: RewardModelConfig<R::Config>,

    /// Discount factor.
    pub gamma: f64,

    /// How to update entropy coefficient.
    pub ent_coef_mode: EntCoefMode,

    /// Batch size for training the actor and the critics.
    pub batch_size: usize,

    /// Seed of the initial parameters.
    pub seed: u64,

    /// Device for all models.
    pub device: Option<Device>,
}

impl<Q, P, R> Clone for SacRrdConfig<Q, P, R>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    R: SubModel1<Output = Tensor>,
    R::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            actor_config: self.actor_config.clone(),
            critic_config: self.critic_config.clone(),
            reward_config: self.reward_config.clone(),
            gamma: self.gamma,
            ent_coef_mode: self.ent_coef_mode.clone(),
            batch_size: self.batch_size,
            seed: self.seed,
            device: self.device,
        }
    }
}

impl<Q, P, R> Default for SacRrdConfig<Q, P, R>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    R: SubModel1<Output = Tensor>,
    R::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            reward_config: Default::default(),
            gamma: 0.99,
            ent_coef_mode: EntCoefMode::Fix(0.1),
            batch_size: 256,
            seed: 1,
            device: None,
        }
    }
}

impl<Q, P, R> SacRrdConfig<Q, P, R>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    R: SubModel1<Output = Tensor>,
    R::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// SAC-alpha.
    pub fn ent_coef_mode(mut self, v: EntCoefMode) -> Self {
        self.ent_coef_mode = v;
        self
    }

    /// Configuration of actor.
    pub fn actor_config(mut self, actor_config: GaussianActorConfig<P::Config>) -> Self {
        self.actor_config = actor_config;
        self
    }

    /// Configuration of critic.
    pub fn critic_config(mut self, critic_config: MultiCriticConfig<Q::Config>) -> Self {
        self.critic_config = critic_config;
        self
    }

    /// Configuration of the reward model.
    pub fn reward_config(mut self, reward_config: RewardModelConfig<R::Config>) -> Self {
        self.reward_config = reward_config;
        self
    }

    /// Seed of the initial parameters.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: candle_core::Device) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Constructs [`SacRrdConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SAC agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`SacRrdConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SAC agent into {:?}", path_);
        Ok(())
    }
}
