use anyhow::Result;
use candle_core::Device;
use rrd_candle_agent::{
    mlp::{Mlp, Mlp2, MlpConfig},
    reward::RewardModelConfig,
    sac_rrd::{EntCoefMode, SacRrd, SacRrdConfig},
    seq::{LstmAttn, LstmAttnConfig},
    state_pred::{SequencePredictor, SequencePredictorConfig},
    util::{actor::GaussianActorConfig, critic::MultiCriticConfig},
};
use rrd_core::{
    observability::ObservabilityFilterConfig, record::NullRecorder, Env, NoPredictor,
    PartialObsEvaluator, StateEstimator, Trainer, TrainerConfig,
};
use rrd_point_mass::{PointMassConfig, PointMassEnv};

const OBS_DIM: usize = 4;
const ACT_DIM: usize = 2;

fn trainer_config(seed: u64) -> TrainerConfig {
    TrainerConfig::default()
        .num_steps(4)
        .env_steps(30)
        .train_batches(2)
        .start_learning_state(20)
        .start_learning(20)
        .eval_interval(1)
        .n_eval_episodes(1)
        .context(4)
        .filter_config(ObservabilityFilterConfig::default().num_hidden(1))
        .seed(seed)
}

fn create_agent(seed: u64, action_scale: Vec<f32>) -> Result<SacRrd<Mlp, Mlp2, Mlp>> {
    let config = SacRrdConfig::<Mlp, Mlp2, Mlp>::default()
        .actor_config(
            GaussianActorConfig::default()
                .policy_config(MlpConfig::new(OBS_DIM, vec![16], ACT_DIM, false))
                .action_scale(action_scale),
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
        .ent_coef_mode(EntCoefMode::Auto(-(ACT_DIM as f64), 3e-4))
        .batch_size(8)
        .seed(seed)
        .device(Device::Cpu);
    SacRrd::build(config)
}

fn create_predictor(seed: u64) -> Result<SequencePredictor<LstmAttn>> {
    let config = SequencePredictorConfig::default()
        .model_config(LstmAttnConfig::new(OBS_DIM + ACT_DIM, OBS_DIM).hidden_size(8))
        .batch_size(16)
        .n_batches(1)
        .seed(seed)
        .device(Device::Cpu);
    SequencePredictor::build(config)
}

/// Runs a short training and returns the reported values of each evaluation.
fn run(seed: u64, estimator: &mut dyn StateEstimator) -> Result<Vec<Vec<f32>>> {
    let env_config = PointMassConfig::default().n_masses(ACT_DIM).max_steps(15);
    let trainer = Trainer::build(trainer_config(seed));
    let mut state = trainer.initialize::<PointMassEnv>(&env_config)?;
    let mut evaluator = PartialObsEvaluator::<PointMassEnv>::build(trainer.config(), &env_config, seed as i64)?;
    let mut agent = create_agent(seed, state.sampler.env().action_scale())?;
    let mut recorder = NullRecorder::default();

    let mut reports = vec![];
    while state.iteration < trainer.config().num_steps {
        if let Some(report) = trainer.step(&mut state, &mut agent, estimator, &mut evaluator, &mut recorder)? {
            let mut values = vec![];
            for key in ["eval_return", "eval_belief_loss", "loss_critic", "loss_rrd", "loss_actor"] {
                if let Ok(v) = report.get_scalar(key) {
                    values.push(v);
                }
            }
            reports.push(values);
        }
    }
    Ok(reports)
}

#[test]
fn test_same_seed_same_run() -> Result<()> {
    let a = run(7, &mut NoPredictor)?;
    let b = run(7, &mut NoPredictor)?;
    assert_eq!(a.len(), 4);
    assert!(a.iter().skip(1).all(|r| r.len() == 5));
    assert_eq!(a, b);

    let c = run(8, &mut NoPredictor)?;
    assert_ne!(a, c);
    Ok(())
}

#[test]
fn test_same_seed_same_run_with_predictor() -> Result<()> {
    let a = run(11, &mut create_predictor(11)?)?;
    let b = run(11, &mut create_predictor(11)?)?;
    assert_eq!(a, b);
    Ok(())
}
