//! Train [`Agent`].
mod config;
mod sampler;
use crate::{
    observability::ObservabilityFilter,
    record::{Record, RecordValue, Recorder},
    trajectory_buffer::TrajectoryBuffer,
    Agent, Env, Evaluator, StateEstimator,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};
pub use sampler::RolloutSampler;
use std::{path::Path, time::SystemTime};

/// Objects owned by a training run.
pub struct TrainerState<E: Env> {
    /// Rollout collection on the training environment.
    pub sampler: RolloutSampler<E>,

    /// Completed episodes.
    pub buffer: TrajectoryBuffer,

    /// Source of every stochastic draw of the run.
    pub rng: StdRng,

    /// Index of the next iteration.
    pub iteration: usize,

    /// Number of agent minibatch updates.
    pub opt_steps: usize,

    /// Best evaluation return so far.
    pub max_eval_return: f32,

    record: Record,
    timer: SystemTime,
}

impl<E: Env> TrainerState<E> {
    /// Transitions of completed episodes collected so far.
    pub fn env_steps(&self) -> usize {
        self.sampler.n_transitions()
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages training loop.
///
/// # Training loop
///
/// [`Trainer::step`] performs an iteration of the loop:
///
/// 0. If the iteration is the policy reset step, reset the value functions of the agent.
/// 1. Perform `env_steps` environment steps with [`RolloutSampler`], pushing completed
///    episodes into the [`TrajectoryBuffer`]. `n` below is the number of transitions
///    of completed episodes.
/// 2. If the estimator is enabled and `n >= start_learning_state`, train the state
///    predictor.
/// 3. If `n >= start_learning`, perform `train_batches` minibatch updates of the agent
///    (reward redistribution, critics, actor, entropy coefficient, target critics),
///    each followed by a soft update of the target state predictor.
/// 4. If `n >= start_learning_state` and the iteration is a multiple of
///    `eval_interval` or the last one, evaluate the policy and write a report
///    to the recorder.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|action|B[Env]
///     B -->|observation|F[ObservabilityFilter]
///     F -->|masked observation|S[StateEstimator]
///     S -->|belief|T[Trajectory]
///     T -->|episode end|D[TrajectoryBuffer]
///     D -->|batches|A
///     D -->|state prediction batches|S
/// ```
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Configuration of the trainer.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Builds the training environment, the buffer and the random number generator.
    pub fn initialize<E: Env>(&self, env_config: &E::Config) -> Result<TrainerState<E>> {
        let env = E::build(env_config, self.config.seed as i64)?;
        let filter =
            ObservabilityFilter::build(&self.config.filter_config, env.partition(), env.obs_dim())?;
        info!(
            "Initialized training, obs_dim = {}, act_dim = {}",
            env.obs_dim(),
            env.act_dim()
        );

        Ok(TrainerState {
            sampler: RolloutSampler::new(env, filter, self.config.context),
            buffer: TrajectoryBuffer::build(&self.config.buffer_config()),
            rng: StdRng::seed_from_u64(self.config.seed),
            iteration: 0,
            opt_steps: 0,
            max_eval_return: f32::MIN,
            record: Record::empty(),
            timer: SystemTime::now(),
        })
    }

    fn is_report_step(&self, iteration: usize) -> bool {
        iteration % self.config.eval_interval.max(1) == 0 || iteration + 1 == self.config.num_steps
    }

    /// Performs an iteration of the training loop.
    ///
    /// Returns the report when one was written.
    pub fn step<E, A, S, V, R>(
        &self,
        state: &mut TrainerState<E>,
        agent: &mut A,
        estimator: &mut S,
        evaluator: &mut V,
        recorder: &mut R,
    ) -> Result<Option<Record>>
    where
        E: Env,
        A: Agent + ?Sized,
        S: StateEstimator + ?Sized,
        V: Evaluator,
        R: Recorder + ?Sized,
    {
        let iteration = state.iteration;
        state.iteration += 1;

        if self.config.policy_reset_step == Some(iteration) {
            info!("Resetting value functions at iteration {}", iteration);
            agent.reset_value_functions()?;
        }

        // Rollout
        agent.train();
        for _ in 0..self.config.env_steps {
            let record = state.sampler.sample_and_push(
                agent,
                estimator,
                &mut state.buffer,
                &mut state.rng,
            )?;
            if let Ok(ret) = record.get_scalar("episode_return") {
                state.record.insert("episode_return", RecordValue::Scalar(ret));
            }
        }
        let env_steps = state.env_steps();

        // State predictor
        if estimator.is_enabled()
            && env_steps >= self.config.start_learning_state
            && !state.buffer.is_empty()
        {
            let record = estimator.opt_with_record(&state.buffer, &mut state.rng)?;
            state.record.merge_inplace(record);
        }

        // Reward redistribution and SAC
        if env_steps >= self.config.start_learning && !state.buffer.is_empty() {
            for _ in 0..self.config.train_batches {
                let record = agent.opt_with_record(&state.buffer, &mut state.rng)?;
                estimator.soft_update()?;
                state.opt_steps += 1;
                state.record.merge_inplace(record);
            }
        }

        // Evaluation and report
        if env_steps < self.config.start_learning_state || !self.is_report_step(iteration) {
            return Ok(None);
        }
        agent.eval();
        let eval_record = evaluator.evaluate(agent, estimator, &mut state.rng)?;
        agent.train();

        let mut record = state.record.clone().merge(eval_record);
        record.insert("iteration", RecordValue::Scalar(iteration as f32));
        record.insert("env_steps", RecordValue::Scalar(env_steps as f32));
        record.insert("opt_steps", RecordValue::Scalar(state.opt_steps as f32));
        record.insert("datetime", RecordValue::DateTime(chrono::Local::now()));
        if let Some((min, max)) = state.buffer.state_range() {
            record.insert("state_min", RecordValue::Array1(min.to_vec()));
            record.insert("state_max", RecordValue::Array1(max.to_vec()));
        }
        let elapsed = state.timer.elapsed()?.as_secs_f32();
        state.timer = SystemTime::now();
        info!("{}", Self::summary(iteration, env_steps, elapsed, &record));

        let eval_return = record.get_scalar("eval_return")?;
        if eval_return > state.max_eval_return {
            state.max_eval_return = eval_return;
            if let Some(model_dir) = &self.config.model_dir {
                let path = Path::new(model_dir).join("best");
                match agent.save_params(&path).and_then(|_| estimator.save_params(&path)) {
                    Ok(()) => info!("Saved the model in {:?}", &path),
                    Err(e) => warn!("Failed to save model in {:?}: {}", &path, e),
                }
            }
        }

        recorder.write(record.clone());
        Ok(Some(record))
    }

    fn summary(iteration: usize, env_steps: usize, elapsed: f32, record: &Record) -> String {
        let mut line = format!(
            "Iteration: {}, Steps: {}, Time: {:.3}s",
            iteration, env_steps, elapsed
        );
        for (key, label) in [
            ("eval_return", "Test rewards"),
            ("loss_actor", "Actor loss"),
            ("loss_critic", "Q loss"),
            ("loss_rrd", "RRD loss"),
            ("ent_coef", "Alpha"),
            ("loss_state", "StateLoss"),
            ("eval_belief_loss", "Test StateLoss"),
        ] {
            if let Ok(v) = record.get_scalar(key) {
                line += &format!(", {}: {:.3e}", label, v);
            }
        }
        line
    }

    /// Train the agent for `num_steps` iterations.
    pub fn train<E, A, S, V, R>(
        &self,
        state: &mut TrainerState<E>,
        agent: &mut A,
        estimator: &mut S,
        evaluator: &mut V,
        recorder: &mut R,
    ) -> Result<()>
    where
        E: Env,
        A: Agent + ?Sized,
        S: StateEstimator + ?Sized,
        V: Evaluator,
        R: Recorder + ?Sized,
    {
        while state.iteration < self.config.num_steps {
            self.step(state, agent, estimator, evaluator, recorder)?;
        }
        recorder.flush();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dummy::{CountingEnv, CountingEnvConfig, DummyAgent, DummyEstimator},
        evaluator::PartialObsEvaluator,
        observability::ObservabilityFilterConfig,
        record::BufferedRecorder,
        NoPredictor,
    };

    fn config() -> TrainerConfig {
        TrainerConfig::default()
            .num_steps(6)
            .env_steps(10)
            .train_batches(3)
            .start_learning_state(20)
            .start_learning(40)
            .eval_interval(2)
            .n_eval_episodes(2)
            .filter_config(ObservabilityFilterConfig::default().num_hidden(1))
    }

    #[test]
    fn test_phases_follow_warmups() -> Result<()> {
        let env_config = CountingEnvConfig::default().episode_len(5);
        let trainer = Trainer::build(config());
        let mut state = trainer.initialize::<CountingEnv>(&env_config)?;
        let mut evaluator = PartialObsEvaluator::<CountingEnv>::build(trainer.config(), &env_config, 1)?;
        let mut agent = DummyAgent::default();
        let mut estimator = DummyEstimator::default();
        let mut recorder = BufferedRecorder::new();

        // 10 transitions per iteration, episodes of 5 steps.
        let mut reports = vec![];
        for _ in 0..6 {
            let report = trainer.step(&mut state, &mut agent, &mut estimator, &mut evaluator, &mut recorder)?;
            reports.push(report.is_some());
        }
        assert_eq!(state.env_steps(), 60);
        assert_eq!(state.buffer.len(), 60);

        // State training from the 2nd iteration (20 transitions), SAC from the 4th (40).
        assert_eq!(estimator.n_opts, 5);
        assert_eq!(agent.n_opts, 3 * 3);
        assert_eq!(estimator.n_soft_updates, 3 * 3);
        assert_eq!(state.opt_steps, 9);

        // Reports at even iterations after the state warmup, and the last one.
        assert_eq!(reports, vec![false, false, true, false, true, true]);
        assert_eq!(recorder.len(), 3);
        let last = recorder.iter().last().unwrap();
        assert_eq!(last.get_scalar("env_steps")?, 60.0);
        assert_eq!(last.get_scalar("eval_return")?, 5.0);
        assert!(last.get_scalar("loss_dummy").is_ok());
        assert!(last.get_array1("state_min").is_ok());
        // 3 evaluations of 2 episodes of 5 steps, all in evaluation mode.
        assert_eq!(agent.n_eval_samples, 30);
        assert!(agent.is_train());
        Ok(())
    }

    #[test]
    fn test_policy_reset_and_disabled_estimator() -> Result<()> {
        let env_config = CountingEnvConfig::default().episode_len(5);
        let trainer = Trainer::build(config().policy_reset_step(Some(4)));
        let mut state = trainer.initialize::<CountingEnv>(&env_config)?;
        let mut evaluator = PartialObsEvaluator::<CountingEnv>::build(trainer.config(), &env_config, 1)?;
        let mut agent = DummyAgent::default();
        let mut recorder = BufferedRecorder::new();

        trainer.train(&mut state, &mut agent, &mut NoPredictor, &mut evaluator, &mut recorder)?;

        assert_eq!(state.iteration, 6);
        assert_eq!(agent.n_resets, 1);
        assert_eq!(recorder.len(), 3);
        assert!(recorder.iter().all(|r| r.get_scalar("loss_state").is_err()));
        Ok(())
    }
}
