//! Environment rollouts under partial observability.
use crate::{
    observability::{blend, ObservabilityFilter},
    record::{Record, RecordValue::Scalar},
    trajectory_buffer::{Trajectory, TrajectoryBuffer},
    Env, History, Policy, PredictorNet, StateEstimator,
};
use anyhow::Result;
use log::trace;
use rand::rngs::StdRng;

/// Data of the episode being collected.
struct InFlightEpisode {
    obs: Vec<Vec<f32>>,
    act: Vec<Vec<f32>>,
    reward: Vec<f32>,
    done: Vec<f32>,
    known: Vec<Vec<f32>>,
}

impl InFlightEpisode {
    fn new(init_obs: Vec<f32>) -> Self {
        let known = vec![1.0; init_obs.len()];
        Self {
            obs: vec![init_obs],
            act: vec![],
            reward: vec![],
            done: vec![0.0],
            known: vec![known],
        }
    }

    fn into_trajectory(self) -> Result<Trajectory> {
        Trajectory::new(self.obs, self.act, self.reward, self.done, self.known)
    }
}

/// Collects episodes with a policy and stores them in a [`TrajectoryBuffer`].
///
/// Each next observation is masked by the [`ObservabilityFilter`], and hidden
/// components are replaced by the belief of a [`StateEstimator`] computed with
/// its target parameters. The blended observation is what the policy sees and
/// what is stored.
pub struct RolloutSampler<E: Env> {
    env: E,
    filter: ObservabilityFilter,
    context: usize,
    episode: Option<InFlightEpisode>,
    n_transitions: usize,
    n_episodes: usize,
}

impl<E: Env> RolloutSampler<E> {
    /// Creates a sampler.
    pub fn new(env: E, filter: ObservabilityFilter, context: usize) -> Self {
        Self {
            env,
            filter,
            context,
            episode: None,
            n_transitions: 0,
            n_episodes: 0,
        }
    }

    /// The environment rolled out.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Transitions of completed episodes pushed into buffers so far.
    pub fn n_transitions(&self) -> usize {
        self.n_transitions
    }

    /// Number of completed episodes.
    pub fn n_episodes(&self) -> usize {
        self.n_episodes
    }

    /// Performs an environment step, pushing the episode into `buffer` when it ends.
    ///
    /// The returned record has `episode_return` and `episode_length` when an
    /// episode ended at this step.
    pub fn sample_and_push<P, S>(
        &mut self,
        policy: &mut P,
        estimator: &S,
        buffer: &mut TrajectoryBuffer,
        rng: &mut StdRng,
    ) -> Result<Record>
    where
        P: Policy + ?Sized,
        S: StateEstimator + ?Sized,
    {
        let mut episode = match self.episode.take() {
            Some(episode) => episode,
            None => {
                let init_obs = self.env.reset()?;
                self.filter.reset();
                InFlightEpisode::new(init_obs)
            }
        };

        let obs = episode.obs[episode.obs.len() - 1].clone();
        let act = policy.sample(&obs, rng)?;
        let (step, mut record) = self.env.step(&act)?;
        episode.act.push(act);

        let filtered = self.filter.filter(&step.obs, rng)?;
        let next_obs = match filtered.known.iter().all(|&k| k == 1.0) {
            true => filtered.obs,
            false => {
                let history = History::window(&episode.obs, &episode.act, self.context);
                let belief = estimator.belief(&history, PredictorNet::Target)?;
                blend(&filtered.known, &filtered.obs, &belief)
            }
        };
        episode.obs.push(next_obs);
        episode.known.push(filtered.known);
        episode.reward.push(step.reward);
        episode.done.push(step.done_flag());

        if step.is_done() {
            let len = episode.act.len();
            let ret: f32 = episode.reward.iter().sum();
            buffer.add(episode.into_trajectory()?)?;
            self.n_transitions += len;
            self.n_episodes += 1;
            trace!("Episode {} finished, length {}", self.n_episodes, len);
            record.insert("episode_return", Scalar(ret));
            record.insert("episode_length", Scalar(len as f32));
        } else {
            self.episode = Some(episode);
        }

        Ok(record)
    }
}
