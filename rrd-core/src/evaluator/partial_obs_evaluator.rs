use super::Evaluator;
use crate::{
    observability::{blend, hidden_mse, ObservabilityFilter},
    record::{Record, RecordValue::Scalar},
    trainer::TrainerConfig,
    Env, History, Policy, PredictorNet, StateEstimator,
};
use anyhow::Result;
use log::debug;
use rand::rngs::StdRng;

/// Evaluates a policy on its own environment instance with the same masking
/// and belief pipeline as rollouts.
///
/// Beliefs are computed with the online parameters of the estimator. The
/// returned record has
///
/// * `eval_return`: mean return of the episodes,
/// * `eval_belief_loss`: mean over episodes of the per-step squared error of
///   beliefs on hidden components, summed over the episode and divided by its
///   length.
pub struct PartialObsEvaluator<E: Env> {
    env: E,
    filter: ObservabilityFilter,
    context: usize,
    n_episodes: usize,
}

impl<E: Env> PartialObsEvaluator<E> {
    /// Builds an evaluator with the masking scheme and history length of `config`.
    pub fn build(config: &TrainerConfig, env_config: &E::Config, seed: i64) -> Result<Self> {
        let env = E::build(env_config, seed)?;
        let filter = ObservabilityFilter::build(&config.filter_config, env.partition(), env.obs_dim())?;
        Ok(Self {
            env,
            filter,
            context: config.context,
            n_episodes: config.n_eval_episodes,
        })
    }

    fn run_episode<P, S>(&mut self, policy: &mut P, estimator: &S, rng: &mut StdRng) -> Result<(f32, f32)>
    where
        P: Policy + ?Sized,
        S: StateEstimator + ?Sized,
    {
        let mut obs = vec![self.env.reset()?];
        let mut act: Vec<Vec<f32>> = vec![];
        let mut ret = 0.0;
        let mut loss = 0.0;
        self.filter.reset();

        loop {
            let a = policy.sample(&obs[obs.len() - 1], rng)?;
            let (step, _) = self.env.step(&a)?;
            act.push(a);

            let filtered = self.filter.filter(&step.obs, rng)?;
            let next_obs = match filtered.known.iter().all(|&k| k == 1.0) {
                true => filtered.obs,
                false => {
                    let history = History::window(&obs, &act, self.context);
                    let belief = estimator.belief(&history, PredictorNet::Online)?;
                    if let Some(mse) = hidden_mse(&filtered.known, &belief, &step.obs) {
                        loss += mse;
                    }
                    blend(&filtered.known, &filtered.obs, &belief)
                }
            };
            obs.push(next_obs);
            ret += step.reward;

            if step.is_done() {
                break;
            }
        }

        Ok((ret, loss / act.len() as f32))
    }
}

impl<E: Env> Evaluator for PartialObsEvaluator<E> {
    fn evaluate<P, S>(&mut self, policy: &mut P, estimator: &S, rng: &mut StdRng) -> Result<Record>
    where
        P: Policy + ?Sized,
        S: StateEstimator + ?Sized,
    {
        let mut total_return = 0.0;
        let mut total_loss = 0.0;
        for ix in 0..self.n_episodes {
            let (ret, loss) = self.run_episode(policy, estimator, rng)?;
            debug!("Evaluation episode {}: return {}, belief loss {}", ix, ret, loss);
            total_return += ret;
            total_loss += loss;
        }
        let n = self.n_episodes.max(1) as f32;

        let mut record = Record::from_scalar("eval_return", total_return / n);
        record.insert("eval_belief_loss", Scalar(total_loss / n));
        Ok(record)
    }
}
