//! Trains SAC with reward redistribution on a partially observed environment.
use anyhow::Result;
use candle_core::Device;
use clap::Parser;
use log::info;
use rrd_candle_agent::{
    mlp::{Mlp, Mlp2, MlpConfig},
    opt::OptimizerConfig,
    reward::RewardModelConfig,
    sac_rrd::{EntCoefMode, SacRrd, SacRrdConfig},
    seq::{LastStepMlp, LstmAttn, LstmAttnConfig},
    state_pred::{SequencePredictor, SequencePredictorConfig},
    util::{actor::GaussianActorConfig, critic::MultiCriticConfig},
};
use rrd_core::{
    error::RrdError,
    observability::ObservabilityFilterConfig,
    record::{NullRecorder, Recorder, RunKey, SeriesRecorder},
    Env, NoPredictor, PartialObsEvaluator, StateEstimator, Trainer, TrainerConfig, ZeroFill,
};
use rrd_point_mass::{PointMassConfig, PointMassEnv};
use rrd_tensorboard::TensorboardRecorder;

const HIDDEN_UNITS: usize = 256;

/// Train SAC with reward redistribution under partial observability
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Random seed
    #[arg(long, default_value_t = 1)]
    seed: i64,

    /// Learning rate of the actor
    #[arg(long, default_value_t = 3e-4)]
    actlr: f64,

    /// Learning rate of the state predictor
    #[arg(long, default_value_t = 1e-3)]
    statelr: f64,

    /// Maximum number of (obs, act) pairs given to the state predictor
    #[arg(long, default_value_t = 20)]
    context: usize,

    /// Learning rate of the critics
    #[arg(long, default_value_t = 3e-4)]
    qlr: f64,

    /// Learning rate of the entropy coefficient, the coefficient is fixed when not positive
    #[arg(long, default_value_t = 3e-4)]
    alpha_lr: f64,

    /// Fixed entropy coefficient
    #[arg(long, default_value_t = 0.1)]
    alpha: f64,

    /// Discount factor
    #[arg(long, default_value_t = 0.99)]
    gamma: f64,

    /// Number of outer iterations
    #[arg(long, default_value_t = 40_000)]
    num_steps: usize,

    /// Transitions required before reward redistribution and SAC are trained
    #[arg(long, default_value_t = 1_000_000)]
    start_learning: usize,

    /// Transitions required before the state predictor is trained
    #[arg(long, default_value_t = 10_000)]
    start_learning_state: usize,

    /// Capacity of the trajectory buffer in transitions
    #[arg(long, default_value_t = 1_000_000)]
    buffer_size: usize,

    /// Number of hidden body parts
    #[arg(long, default_value_t = 0)]
    num_hidden: usize,

    /// Agent minibatch updates per iteration
    #[arg(long, default_value_t = 100)]
    train_batches: usize,

    /// Environment steps per iteration
    #[arg(long, default_value_t = 100)]
    env_steps: usize,

    /// Number of consecutive steps a body part stays hidden
    #[arg(long, default_value_t = 1)]
    consec_hidden: usize,

    /// Name of the environment
    #[arg(long, default_value = "PointMass-v0")]
    env: String,

    /// Append evaluation results and losses to series files under `save_dir`
    #[arg(long, default_value_t = false)]
    logging: bool,

    /// Predict hidden components with a learned model
    #[arg(long, default_value_t = false)]
    statepred: bool,

    /// Fill hidden components with their last observed values, otherwise with zeros
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    statefill: bool,

    /// Model of the state predictor, `lstm` or `nn`
    #[arg(long, default_value = "lstm")]
    statemodel: String,

    /// Number of minibatches the state predictor data of an iteration is split into
    #[arg(long, default_value_t = 4)]
    num_breaks: usize,

    /// Multiplier of the number of state predictor minibatches
    #[arg(long, default_value_t = 1)]
    state_train_mult: usize,

    /// Hidden size of the LSTM state predictor
    #[arg(long, default_value_t = 64)]
    hidden_size_lstm: usize,

    /// Iteration at which the value functions are reset, -1 for never
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    policy_reset_step: i64,

    /// Root directory of series files
    #[arg(long, default_value = "./saved_mujoco")]
    save_dir: String,

    /// Write TensorBoard event files into the directory
    #[arg(long)]
    tensorboard: Option<String>,

    /// Save the parameters of the best policy into the directory
    #[arg(long)]
    model_dir: Option<String>,

    /// Number of masses of the point mass environment
    #[arg(long, default_value_t = 3)]
    n_masses: usize,

    /// Maximum number of steps of an episode
    #[arg(long, default_value_t = 200)]
    max_episode_steps: usize,

    /// Pay the return of an episode at its last step only
    #[arg(long, default_value_t = false)]
    delayed_reward: bool,
}

impl Args {
    fn policy_reset_step(&self) -> Option<usize> {
        match self.policy_reset_step < 0 {
            true => None,
            false => Some(self.policy_reset_step as usize),
        }
    }

    fn ent_coef_mode(&self, act_dim: usize) -> EntCoefMode {
        match self.alpha_lr > 0.0 {
            true => EntCoefMode::Auto(-(act_dim as f64), self.alpha_lr),
            false => EntCoefMode::Fix(self.alpha),
        }
    }
}

fn env_config(args: &Args) -> Result<PointMassConfig> {
    match args.env.as_str() {
        "PointMass-v0" => Ok(PointMassConfig::default()
            .n_masses(args.n_masses)
            .max_steps(args.max_episode_steps)
            .delayed_reward(args.delayed_reward)),
        name => Err(RrdError::InvalidConfig(format!("No environment binding for {}", name)).into()),
    }
}

fn trainer_config(args: &Args) -> TrainerConfig {
    let config = TrainerConfig::default()
        .num_steps(args.num_steps)
        .env_steps(args.env_steps)
        .train_batches(args.train_batches)
        .start_learning_state(args.start_learning_state)
        .start_learning(args.start_learning)
        .context(args.context)
        .buffer_capacity(args.buffer_size)
        .filter_config(
            ObservabilityFilterConfig::default()
                .num_hidden(args.num_hidden)
                .consecutive_hidden(args.consec_hidden),
        )
        .policy_reset_step(args.policy_reset_step())
        .seed(args.seed as u64);
    match &args.model_dir {
        Some(model_dir) => config.model_dir(model_dir.as_str()),
        None => config,
    }
}

fn create_agent(
    args: &Args,
    obs_dim: usize,
    act_dim: usize,
    action_scale: Vec<f32>,
) -> Result<SacRrd<Mlp, Mlp2, Mlp>> {
    let device = Device::cuda_if_available(0)?;
    let units = vec![HIDDEN_UNITS, HIDDEN_UNITS];
    let actor_config = GaussianActorConfig::default()
        .opt_config(OptimizerConfig::default().learning_rate(args.actlr))
        .policy_config(MlpConfig::new(obs_dim, units.clone(), act_dim, false))
        .action_scale(action_scale);
    let critic_config = MultiCriticConfig::default()
        .opt_config(OptimizerConfig::default().learning_rate(args.qlr))
        .q_config(MlpConfig::new(obs_dim + act_dim, units.clone(), 1, false));
    let reward_config = RewardModelConfig::default()
        .model_config(MlpConfig::new(2 * obs_dim + act_dim, units, 1, false));
    let config = SacRrdConfig::<Mlp, Mlp2, Mlp>::default()
        .actor_config(actor_config)
        .critic_config(critic_config)
        .reward_config(reward_config)
        .discount_factor(args.gamma)
        .ent_coef_mode(args.ent_coef_mode(act_dim))
        .seed(args.seed as u64)
        .device(device);
    SacRrd::build(config)
}

fn create_estimator(args: &Args, obs_dim: usize, act_dim: usize) -> Result<Box<dyn StateEstimator>> {
    if !args.statepred {
        return match args.statefill {
            true => Ok(Box::new(NoPredictor)),
            false => Ok(Box::new(ZeroFill)),
        };
    }

    let device = Device::cuda_if_available(0)?;
    let num_breaks = args.num_breaks.max(1);
    let opt_config = OptimizerConfig::default().learning_rate(args.statelr);
    let batch_size = args.train_batches * 256 / num_breaks;
    let n_batches = args.state_train_mult * num_breaks;
    let in_dim = obs_dim + act_dim;

    match args.statemodel.as_str() {
        "lstm" => {
            let config = SequencePredictorConfig::default()
                .model_config(LstmAttnConfig::new(in_dim, obs_dim).hidden_size(args.hidden_size_lstm))
                .opt_config(opt_config)
                .batch_size(batch_size)
                .n_batches(n_batches)
                .seed(args.seed as u64)
                .device(device);
            Ok(Box::new(SequencePredictor::<LstmAttn>::build(config)?))
        }
        "nn" => {
            let config = SequencePredictorConfig::default()
                .model_config(MlpConfig::new(in_dim, vec![HIDDEN_UNITS, HIDDEN_UNITS], obs_dim, false))
                .opt_config(opt_config)
                .batch_size(batch_size)
                .n_batches(n_batches)
                .seed(args.seed as u64)
                .device(device);
            Ok(Box::new(SequencePredictor::<LastStepMlp>::build(config)?))
        }
        name => Err(RrdError::InvalidConfig(format!("Unknown state model {}", name)).into()),
    }
}

fn run_key(args: &Args) -> RunKey {
    RunKey {
        env: args.env.clone(),
        context_critic: false,
        state_model: match args.statepred {
            true => Some(args.statemodel.clone()),
            false => None,
        },
        state_fill: args.statefill,
        num_hidden: args.num_hidden,
        seed: args.seed,
        critic_lr: args.qlr,
        actor_lr: args.actlr,
        state_lr: args.statelr,
        start_learning_state: args.start_learning_state,
        start_learning: args.start_learning,
        hidden_size: args.hidden_size_lstm,
        context: args.context,
        policy_reset_step: args.policy_reset_step,
    }
}

fn create_recorder(args: &Args) -> Box<dyn Recorder> {
    match (args.logging, &args.tensorboard) {
        (true, _) => Box::new(SeriesRecorder::new(&args.save_dir, run_key(args))),
        (false, Some(logdir)) => Box::new(TensorboardRecorder::new(logdir)),
        (false, None) => Box::new(NullRecorder::default()),
    }
}

fn train(args: &Args) -> Result<()> {
    let env_config = env_config(args)?;
    let trainer = Trainer::build(trainer_config(args));
    let mut state = trainer.initialize::<PointMassEnv>(&env_config)?;
    let mut evaluator = PartialObsEvaluator::<PointMassEnv>::build(trainer.config(), &env_config, args.seed)?;

    let (obs_dim, act_dim, action_scale) = {
        let env = state.sampler.env();
        (env.obs_dim(), env.act_dim(), env.action_scale())
    };
    let mut agent = create_agent(args, obs_dim, act_dim, action_scale)?;
    let mut estimator = create_estimator(args, obs_dim, act_dim)?;
    let mut recorder = create_recorder(args);
    info!("Start training on {} with {} hidden body parts", args.env, args.num_hidden);

    trainer.train(
        &mut state,
        &mut agent,
        estimator.as_mut(),
        &mut evaluator,
        &mut recorder,
    )?;
    info!("Best evaluation return: {}", state.max_eval_return);

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    train(&args)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    fn args(extra: &[&str]) -> Args {
        let base = [
            "rrd",
            "--num-steps",
            "3",
            "--env-steps",
            "30",
            "--train-batches",
            "2",
            "--start-learning",
            "10",
            "--start-learning-state",
            "10",
            "--n-masses",
            "2",
            "--max-episode-steps",
            "10",
            "--num-hidden",
            "1",
            "--context",
            "4",
            "--hidden-size-lstm",
            "8",
        ];
        Args::parse_from(base.iter().chain(extra.iter()).copied())
    }

    #[test]
    fn test_default_flags() {
        let args = Args::parse_from(["rrd"]);
        assert_eq!(args.policy_reset_step(), None);
        assert!(args.statefill);
        assert!(!args.statepred);
        assert_eq!(args.ent_coef_mode(3), EntCoefMode::Auto(-3.0, 3e-4));
        assert_eq!(args.env, "PointMass-v0");

        let args = Args::parse_from(["rrd", "--alpha-lr", "0", "--statefill", "false", "--policy-reset-step", "5"]);
        assert_eq!(args.ent_coef_mode(3), EntCoefMode::Fix(0.1));
        assert_eq!(args.policy_reset_step(), Some(5));
        assert_eq!(run_key(&args).state_model_label(), "NoFill");
    }

    #[test]
    fn test_unknown_env() {
        let args = args(&["--env", "Hopper-v2"]);
        assert!(train(&args).is_err());
    }

    #[test]
    fn test_train_with_series() -> Result<()> {
        let tmp_dir = TempDir::new("rrd")?;
        let save_dir = tmp_dir.path().to_str().unwrap();
        let args = args(&["--logging", "--statepred", "--statemodel", "nn", "--save-dir", save_dir]);
        train(&args)?;

        let path = run_key(&args).series_path(save_dir, "eval_return");
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_train_with_tensorboard() -> Result<()> {
        let tmp_dir = TempDir::new("rrd")?;
        let logdir = tmp_dir.path().to_str().unwrap();
        let args = args(&["--statepred", "--tensorboard", logdir]);
        train(&args)?;
        Ok(())
    }
}
