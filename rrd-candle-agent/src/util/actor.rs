//! Actor with tanh-squashed Gaussian policy.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{init_seeded, randn, OutDim},
};
use anyhow::{ensure, Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use rand::rngs::StdRng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Added to the Jacobian term of the log probability.
const EPSILON: f64 = 1e-6;

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`GaussianActor`].
pub struct GaussianActorConfig<P: OutDim> {
    pub policy_config: Option<P>,
    pub opt_config: OptimizerConfig,
    pub min_log_std: f64,
    pub max_log_std: f64,

    /// Lower bound of the standard deviation in [`GaussianActor::action_logp`].
    pub min_std: f64,

    /// Half widths of the action box, `(high - low) / 2`.
    pub action_scale: Vec<f32>,
}

impl<P: OutDim> Default for GaussianActorConfig<P> {
    fn default() -> Self {
        Self {
            policy_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.0003 },
            min_log_std: -20.0,
            max_log_std: 2.0,
            min_std: 0.01,
            action_scale: vec![],
        }
    }
}

impl<P> GaussianActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the minimum value of log std.
    pub fn min_log_std(mut self, v: f64) -> Self {
        self.min_log_std = v;
        self
    }

    /// Sets the maximum value of log std.
    pub fn max_log_std(mut self, v: f64) -> Self {
        self.max_log_std = v;
        self
    }

    /// Sets configurations for policy function.
    pub fn policy_config(mut self, v: P) -> Self {
        self.policy_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(pi_config) = &mut self.policy_config {
            pi_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the half widths of the action box.
    pub fn action_scale(mut self, v: Vec<f32>) -> Self {
        self.action_scale = v;
        self
    }

    /// Loads [`GaussianActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`GaussianActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Actor with tanh-squashed Gaussian policy.
///
/// Actions are `tanh(u) * scale` where `u` is drawn from the Gaussian given by
/// the policy network.
pub struct GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    device: Device,
    varmap: VarMap,

    // Dimension of the action vector.
    out_dim: usize,

    policy: P,

    // Optimizer
    opt_config: OptimizerConfig,
    opt: Optimizer,

    min_log_std: f64,
    max_log_std: f64,
    min_std: f64,

    // Shape [1, out_dim]
    action_scale: Tensor,
}

impl<P> GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`GaussianActor`] with parameters drawn from `rng`.
    pub fn build(config: GaussianActorConfig<P::Config>, device: Device, rng: &mut StdRng) -> Result<Self> {
        let policy_config = config.policy_config.context("policy_config is not set.")?;
        let out_dim = policy_config.get_out_dim();
        ensure!(
            config.action_scale.len() == out_dim,
            "action_scale has {} elements for {} actions",
            config.action_scale.len(),
            out_dim
        );
        let action_scale = Tensor::from_slice(&config.action_scale, (1, out_dim), &device)?;
        let varmap = VarMap::new();
        let policy = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device).set_prefix("actor");
            P::build(vb, policy_config)?
        };
        init_seeded(&varmap, rng)?;
        let opt_config = config.opt_config;
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            out_dim,
            policy,
            opt_config,
            opt,
            min_log_std: config.min_log_std,
            max_log_std: config.max_log_std,
            min_std: config.min_std,
            action_scale,
        })
    }

    /// Returns the mean and the clamped log standard deviation given observations.
    ///
    /// The shape of the both tensors is `(batch_size, action_dimension)`.
    pub fn forward(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, lstd) = self.policy.forward(obs)?;
        debug_assert_eq!(mean.dims()[1], self.out_dim);
        let lstd = lstd.clamp(self.min_log_std, self.max_log_std)?;
        Ok((mean, lstd))
    }

    /// Samples actions without tracking gradients.
    ///
    /// If `train` is `true`, actions are sampled from the Gaussian distribution.
    /// Otherwise, the mean of the distribution is squashed.
    pub fn sample(&self, obs: &Tensor, train: bool, rng: &mut StdRng) -> Result<Tensor> {
        let (mean, lstd) = self.forward(obs)?;
        let u = match train {
            true => {
                let z = randn(rng, mean.dims(), &self.device)?;
                (mean + (lstd.exp()? * z)?)?
            }
            false => mean,
        };
        Ok(u.tanh()?.broadcast_mul(&self.action_scale)?.detach())
    }

    /// Returns reparameterized actions and their log probabilities.
    ///
    /// The standard deviation is bounded below by `min_std`. The shapes of the
    /// outputs are `(batch_size, action_dimension)` and `(batch_size,)`.
    pub fn action_logp(&self, obs: &Tensor, rng: &mut StdRng) -> Result<(Tensor, Tensor)> {
        let (mean, lstd) = self.forward(obs)?;
        let std = lstd.exp()?.maximum(self.min_std)?;
        let z = randn(rng, mean.dims(), &self.device)?;
        let u = (&mean + (&std * &z)?)?;
        let t = u.tanh()?;
        let act = t.broadcast_mul(&self.action_scale)?;

        // log N(u; mean, std) with (u - mean) / std = z
        let log_norm = (2.0 * std::f64::consts::PI).ln() * 0.5;
        let logp_u = ((z.sqr()? * -0.5)? - std.log()?)?.affine(1.0, -log_norm)?;
        let log_jacobian = (t.sqr()?.affine(-1.0, 1.0)?.broadcast_mul(&self.action_scale)? + EPSILON)?.log()?;
        let logp = (logp_u - log_jacobian)?.sum(D::Minus1)?;

        Ok((act, logp))
    }

    /// Updates the policy parameters.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Re-creates the optimizer, dropping its moment estimates.
    pub fn reset_optimizer(&mut self) -> Result<()> {
        self.opt = self.opt_config.build(self.varmap.all_vars())?;
        Ok(())
    }

    /// Save variables to prefix + ".safetensors".
    pub fn save(&self, prefix: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("safetensors");
        self.varmap.save(&path)?;
        info!("Save actor parameters to {:?}", path);
        Ok(path)
    }

    /// Load variables from prefix + ".safetensors".
    pub fn load(&mut self, prefix: impl AsRef<Path>) -> Result<()> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("safetensors");
        self.varmap.load(&path)?;
        info!("Load actor parameters from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::{Mlp2, MlpConfig};
    use rand::SeedableRng;
    use tempdir::TempDir;

    fn actor(scale: f32) -> Result<GaussianActor<Mlp2>> {
        let config = GaussianActorConfig::default()
            .policy_config(MlpConfig::new(3, vec![16], 2, false))
            .action_scale(vec![scale, scale]);
        GaussianActor::build(config, Device::Cpu, &mut StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_actions_are_bounded() -> Result<()> {
        let actor = actor(2.0)?;
        let mut rng = StdRng::seed_from_u64(0);
        let obs = Tensor::from_slice(&[0.5f32, -1.0, 3.0, 100.0, -100.0, 0.0], (2, 3), &Device::Cpu)?;

        for train in [true, false] {
            let act: Vec<Vec<f32>> = actor.sample(&obs, train, &mut rng)?.to_vec2()?;
            assert!(act.iter().flatten().all(|a| a.abs() <= 2.0));
        }
        let (act, logp) = actor.action_logp(&obs, &mut rng)?;
        assert_eq!(act.dims(), &[2, 2]);
        assert_eq!(logp.dims(), &[2]);
        Ok(())
    }

    #[test]
    fn test_eval_actions_are_deterministic() -> Result<()> {
        let actor = actor(1.0)?;
        let obs = Tensor::from_slice(&[0.1f32, 0.2, 0.3], (1, 3), &Device::Cpu)?;
        let a1: Vec<Vec<f32>> = actor.sample(&obs, false, &mut StdRng::seed_from_u64(1))?.to_vec2()?;
        let a2: Vec<Vec<f32>> = actor.sample(&obs, false, &mut StdRng::seed_from_u64(2))?.to_vec2()?;
        assert_eq!(a1, a2);
        Ok(())
    }

    #[test]
    fn test_missing_action_scale() {
        let config = GaussianActorConfig::default().policy_config(MlpConfig::new(3, vec![16], 2, false));
        assert!(GaussianActor::<Mlp2>::build(config, Device::Cpu, &mut StdRng::seed_from_u64(42)).is_err());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("actor")?;
        let a = actor(1.0)?;
        let config = GaussianActorConfig::default()
            .policy_config(MlpConfig::new(3, vec![16], 2, false))
            .action_scale(vec![1.0, 1.0]);
        let mut b = GaussianActor::<Mlp2>::build(config, Device::Cpu, &mut StdRng::seed_from_u64(7))?;
        let obs = Tensor::from_slice(&[0.1f32, 0.2, 0.3], (1, 3), &Device::Cpu)?;
        let mut rng = StdRng::seed_from_u64(0);

        a.save(dir.path().join("actor"))?;
        b.load(dir.path().join("actor"))?;
        let act_a: Vec<Vec<f32>> = a.sample(&obs, false, &mut rng)?.to_vec2()?;
        let act_b: Vec<Vec<f32>> = b.sample(&obs, false, &mut rng)?.to_vec2()?;
        assert_eq!(act_a, act_b);
        Ok(())
    }
}
