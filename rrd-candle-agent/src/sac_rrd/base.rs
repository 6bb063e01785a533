use super::{EntCoef, SacRrdConfig};
use crate::{
    model::{SubModel1, SubModel2},
    reward::RewardModel,
    util::{actor::GaussianActor, critic::MultiCritic, rows, scalar, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::loss::mse;
use log::{info, trace};
use rand::{rngs::StdRng, SeedableRng};
use rrd_core::{
    error::RrdError,
    record::{Record, RecordValue},
    trajectory_buffer::{TrajectoryBuffer, TransitionBatch},
    Agent, Policy,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, fs, path::Path};

type ActionValue = Tensor;
type ActMean = Tensor;
type ActStd = Tensor;

/// Tensors of a minibatch of transitions.
struct Batch {
    obs: Tensor,
    act: Tensor,
    next_obs: Tensor,
    not_done: Tensor,
}

impl Batch {
    fn new(batch: &TransitionBatch, device: &Device) -> Result<Self> {
        let not_done = batch.next_done.iter().map(|d| 1.0 - d).collect::<Vec<f32>>();
        Ok(Self {
            obs: rows(&batch.obs, batch.len, batch.obs_dim, device)?,
            act: rows(&batch.act, batch.len, batch.act_dim, device)?,
            next_obs: rows(&batch.next_obs, batch.len, batch.obs_dim, device)?,
            not_done: Tensor::from_vec(not_done, (batch.len,), device)?,
        })
    }
}

/// Soft actor critic (SAC) agent with reward redistribution.
///
/// Each optimization step performs, in order, an update of the reward model on
/// sub-sequences of episodes, an update of the critics, an update of the actor
/// and the entropy coefficient on a minibatch of transitions, and a soft update
/// of the target critics. The critic targets use the predicted rewards instead
/// of the rewards of the environment.
pub struct SacRrd<Q, P, R>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = (ActMean, ActStd)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    R: SubModel1<Input = Tensor, Output = Tensor>,
    R::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    config: SacRrdConfig<Q, P, R>,
    critic: MultiCritic<Q>,
    actor: GaussianActor<P>,
    reward: RewardModel<R>,
    ent_coef: EntCoef,
    gamma: f64,
    batch_size: usize,
    train: bool,
    n_opts: usize,
    device: Device,

    // Draws parameters of the networks, also when the critics are reset.
    init_rng: StdRng,
}

impl<Q, P, R> SacRrd<Q, P, R>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = (ActMean, ActStd)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    R: SubModel1<Input = Tensor, Output = Tensor>,
    R::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Constructs [`SacRrd`] agent.
    ///
    /// Initial parameters of all networks are drawn from a generator seeded
    /// with `config.seed`.
    pub fn build(config: SacRrdConfig<Q, P, R>) -> Result<Self> {
        let device: Device = config
            .device
            .context("No device is given for SAC agent")?
            .into();
        let mut init_rng = StdRng::seed_from_u64(config.seed);
        let actor = GaussianActor::build(config.actor_config.clone(), device.clone(), &mut init_rng)?;
        let critic = MultiCritic::build(config.critic_config.clone(), device.clone(), &mut init_rng)?;
        let reward = RewardModel::build(config.reward_config.clone(), device.clone(), &mut init_rng)?;
        let ent_coef = EntCoef::new(config.ent_coef_mode.clone(), device.clone())?;
        info!(
            "Built SAC agent with reward redistribution on {:?}, seed = {}",
            device, config.seed
        );

        Ok(Self {
            gamma: config.gamma,
            batch_size: config.batch_size,
            config,
            critic,
            actor,
            reward,
            ent_coef,
            train: true,
            n_opts: 0,
            device,
            init_rng,
        })
    }

    /// Number of minibatch updates so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    fn update_critic(&mut self, batch: &Batch, rng: &mut StdRng) -> Result<f32> {
        let loss = {
            // Prediction
            let qs = self.critic.qvals(&batch.obs, &batch.act)?;

            // Target
            let tgt = {
                let r_hat = self
                    .reward
                    .predict(&batch.obs, &batch.act, &batch.next_obs)?
                    .detach();
                let (next_act, next_logp) = self.actor.action_logp(&batch.next_obs, rng)?;
                let next_q = self.critic.qvals_min_tgt(&batch.next_obs, &next_act)?;
                let next_q = (next_q - self.ent_coef.alpha()?.broadcast_mul(&next_logp)?)?;
                (r_hat + ((&batch.not_done * next_q)? * self.gamma)?)?.detach()
            };

            let mut loss = mse(&qs[0], &tgt)?;
            for q in qs[1..].iter() {
                loss = (loss + mse(q, &tgt)?)?;
            }
            loss
        };

        self.critic.backward_step(&loss)?;
        scalar(&loss)
    }

    fn update_actor(&mut self, batch: &Batch, rng: &mut StdRng) -> Result<f32> {
        let (act, logp) = self.actor.action_logp(&batch.obs, rng)?;
        let loss = {
            let qval = self.critic.qvals_min(&batch.obs, &act)?;
            (self.ent_coef.alpha()?.broadcast_mul(&logp)? - qval)?.mean_all()?
        };

        // Only the actor parameters are updated
        self.actor.backward_step(&loss)?;
        self.ent_coef.update(&logp)?;

        scalar(&loss)
    }

    fn opt_(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<Record> {
        trace!("update_reward_model()");
        let loss_rrd = self.reward.update(buffer, rng)?;

        trace!("batch()");
        let batch: TransitionBatch = buffer.sample_transitions(self.batch_size, rng)?.into();
        let batch = Batch::new(&batch, &self.device)?;

        trace!("update_critic()");
        let loss_critic = self.update_critic(&batch, rng)?;

        trace!("update_actor()");
        let loss_actor = self.update_actor(&batch, rng)?;

        trace!("soft_update()");
        self.critic.soft_update()?;

        self.n_opts += 1;

        Ok(Record::from_slice(&[
            ("loss_rrd", RecordValue::Scalar(loss_rrd)),
            ("loss_critic", RecordValue::Scalar(loss_critic)),
            ("loss_actor", RecordValue::Scalar(loss_actor)),
            ("ent_coef", RecordValue::Scalar(self.ent_coef.value()?)),
        ]))
    }
}

impl<Q, P, R> Policy for SacRrd<Q, P, R>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = (ActMean, ActStd)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    R: SubModel1<Input = Tensor, Output = Tensor>,
    R::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn sample(&mut self, obs: &[f32], rng: &mut StdRng) -> Result<Vec<f32>> {
        let obs = rows(obs, 1, obs.len(), &self.device)?;
        let act = self.actor.sample(&obs, self.train, rng)?;
        act.to_vec2::<f32>()?
            .into_iter()
            .next()
            .ok_or_else(|| RrdError::BrokenInvariant("empty action batch".to_string()).into())
    }
}

impl<Q, P, R> Agent for SacRrd<Q, P, R>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = ActionValue>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Input = Tensor, Output = (ActMean, ActStd)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    R: SubModel1<Input = Tensor, Output = Tensor>,
    R::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
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
        self.opt_(buffer, rng)
    }

    fn reset_value_functions(&mut self) -> Result<()> {
        self.critic = MultiCritic::build(
            self.config.critic_config.clone(),
            self.device.clone(),
            &mut self.init_rng,
        )?;
        self.ent_coef = EntCoef::new(self.config.ent_coef_mode.clone(), self.device.clone())?;
        self.actor.reset_optimizer()?;
        info!("Reset critics, entropy coefficient and actor optimizer");
        Ok(())
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.critic.save(path.join("critic"))?;
        self.actor.save(path.join("actor"))?;
        self.reward.save(path.join("rrd"))?;
        self.ent_coef.save(path.join("ent_coef.safetensors"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.critic.load(path.join("critic"))?;
        self.actor.load(path.join("actor"))?;
        self.reward.load(path.join("rrd"))?;
        self.ent_coef.load(path.join("ent_coef.safetensors"))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        mlp::{Mlp, Mlp2, MlpConfig},
        reward::RewardModelConfig,
        sac_rrd::EntCoefMode,
        util::{actor::GaussianActorConfig, critic::MultiCriticConfig},
    };
    use rrd_core::trajectory_buffer::{Trajectory, TrajectoryBufferConfig};
    use tempdir::TempDir;

    const OBS_DIM: usize = 3;
    const ACT_DIM: usize = 2;

    fn agent(ent_coef_mode: EntCoefMode) -> Result<SacRrd<Mlp, Mlp2, Mlp>> {
        seeded_agent(ent_coef_mode, 0)
    }

    fn seeded_agent(ent_coef_mode: EntCoefMode, seed: u64) -> Result<SacRrd<Mlp, Mlp2, Mlp>> {
        let config = SacRrdConfig::<Mlp, Mlp2, Mlp>::default()
            .actor_config(
                GaussianActorConfig::default()
                    .policy_config(MlpConfig::new(OBS_DIM, vec![16], ACT_DIM, false))
                    .action_scale(vec![1.0; ACT_DIM]),
            )
            .critic_config(
                MultiCriticConfig::default().q_config(MlpConfig::new(OBS_DIM + ACT_DIM, vec![16], 1, false)),
            )
            .reward_config(
                RewardModelConfig::default()
                    .model_config(MlpConfig::new(2 * OBS_DIM + ACT_DIM, vec![16], 1, false))
                    .sub_len(4)
                    .num_subs(2),
            )
            .ent_coef_mode(ent_coef_mode)
            .batch_size(8)
            .seed(seed)
            .device(Device::Cpu);
        SacRrd::build(config)
    }

    fn buffer() -> Result<TrajectoryBuffer> {
        let mut buffer = TrajectoryBuffer::build(&TrajectoryBufferConfig::default());
        for e in 0..3 {
            let len = 6 + e;
            let obs = (0..=len).map(|t| vec![0.1 * t as f32, -0.1 * e as f32, 0.5]).collect();
            let act = (0..len).map(|t| vec![0.1 * t as f32, 0.0]).collect();
            let mut done = vec![0.0; len + 1];
            done[len] = 1.0;
            buffer.add(Trajectory::new(obs, act, vec![1.0; len], done, vec![vec![1.0; OBS_DIM]; len + 1])?)?;
        }
        Ok(buffer)
    }

    fn outputs(agent: &SacRrd<Mlp, Mlp2, Mlp>) -> Result<(Vec<f32>, Vec<f32>)> {
        let obs = rows(&[0.1, 0.2, 0.3, -0.3, 0.0, 1.0], 2, OBS_DIM, &Device::Cpu)?;
        let act = rows(&[0.5, -0.5, 0.0, 0.2], 2, ACT_DIM, &Device::Cpu)?;
        let q = agent.critic.qvals_min(&obs, &act)?.to_vec1()?;
        let a = agent
            .actor
            .sample(&obs, false, &mut StdRng::seed_from_u64(0))?
            .flatten_all()?
            .to_vec1()?;
        Ok((q, a))
    }

    #[test]
    fn test_opt_with_record() -> Result<()> {
        let mut agent = agent(EntCoefMode::Auto(-(ACT_DIM as f64), 0.0003))?;
        let buffer = buffer()?;
        let mut rng = StdRng::seed_from_u64(0);

        let record = agent.opt_with_record(&buffer, &mut rng)?;
        for key in ["loss_rrd", "loss_critic", "loss_actor", "ent_coef"] {
            assert!(record.get_scalar(key)?.is_finite(), "{}", key);
        }
        assert_ne!(record.get_scalar("ent_coef")?, 1.0);
        assert_eq!(agent.n_opts(), 1);
        Ok(())
    }

    #[test]
    fn test_actor_update_keeps_critics() -> Result<()> {
        let mut agent = agent(EntCoefMode::Fix(0.1))?;
        let buffer = buffer()?;
        let mut rng = StdRng::seed_from_u64(1);
        let batch: TransitionBatch = buffer.sample_transitions(8, &mut rng)?.into();
        let batch = Batch::new(&batch, &Device::Cpu)?;

        let (q0, a0) = outputs(&agent)?;
        agent.update_actor(&batch, &mut rng)?;
        let (q1, a1) = outputs(&agent)?;
        assert_eq!(q0, q1);
        assert_ne!(a0, a1);
        Ok(())
    }

    #[test]
    fn test_reset_value_functions_keeps_actor() -> Result<()> {
        let mut agent = agent(EntCoefMode::Fix(0.1))?;
        let (q0, a0) = outputs(&agent)?;
        agent.reset_value_functions()?;
        let (q1, a1) = outputs(&agent)?;
        assert_ne!(q0, q1);
        assert_eq!(a0, a1);
        Ok(())
    }

    #[test]
    fn test_sample_modes() -> Result<()> {
        let mut agent = agent(EntCoefMode::Fix(0.1))?;
        let obs = [0.1, 0.2, 0.3];

        agent.eval();
        let a1 = agent.sample(&obs, &mut StdRng::seed_from_u64(0))?;
        let a2 = agent.sample(&obs, &mut StdRng::seed_from_u64(1))?;
        assert_eq!(a1, a2);
        assert_eq!(a1.len(), ACT_DIM);

        agent.train();
        let a1 = agent.sample(&obs, &mut StdRng::seed_from_u64(0))?;
        let a2 = agent.sample(&obs, &mut StdRng::seed_from_u64(1))?;
        assert_ne!(a1, a2);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("sac_rrd")?;
        let a = seeded_agent(EntCoefMode::Fix(0.1), 1)?;
        let mut b = seeded_agent(EntCoefMode::Fix(0.1), 2)?;
        assert_ne!(outputs(&a)?, outputs(&b)?);
        a.save_params(dir.path())?;
        b.load_params(dir.path())?;
        assert_eq!(outputs(&a)?, outputs(&b)?);
        Ok(())
    }

    #[test]
    fn test_seeded_build() -> Result<()> {
        let a = seeded_agent(EntCoefMode::Fix(0.1), 3)?;
        let b = seeded_agent(EntCoefMode::Fix(0.1), 3)?;
        let c = seeded_agent(EntCoefMode::Fix(0.1), 4)?;
        assert_eq!(outputs(&a)?, outputs(&b)?);
        assert_ne!(outputs(&a)?, outputs(&c)?);

        // Same updates from the same parameters.
        let (mut a, mut b) = (a, b);
        let buffer = buffer()?;
        let ra = a.opt_with_record(&buffer, &mut StdRng::seed_from_u64(5))?;
        let rb = b.opt_with_record(&buffer, &mut StdRng::seed_from_u64(5))?;
        for key in ["loss_rrd", "loss_critic", "loss_actor"] {
            assert_eq!(ra.get_scalar(key)?, rb.get_scalar(key)?, "{}", key);
        }
        Ok(())
    }
}
