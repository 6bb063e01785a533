//! A single episode.
use super::{StateFeatures, SubSequence, Transition};
use crate::{
    error::RrdError,
    util::{sample_indices, sub},
};
use anyhow::Result;
use rand::rngs::StdRng;

/// Observations, actions, rewards, done flags and known-masks of one episode.
///
/// A trajectory with `L` transitions holds `L + 1` observations, done flags and
/// known-masks (the bootstrap state is included) and `L` actions and rewards.
/// Fields are stored row-major in flat vectors.
#[derive(Debug, Clone)]
pub struct Trajectory {
    obs_dim: usize,
    act_dim: usize,
    obs: Vec<f32>,
    act: Vec<f32>,
    reward: Vec<f32>,
    done: Vec<f32>,
    known: Vec<f32>,
}

fn flatten(rows: Vec<Vec<f32>>, dim: usize, field: &str) -> Result<Vec<f32>> {
    let mut flat = Vec::with_capacity(rows.len() * dim);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != dim {
            return Err(RrdError::DimensionMismatch {
                context: format!("{}[{}]", field, i),
                expected: dim,
                actual: row.len(),
            }
            .into());
        }
        flat.extend(row);
    }
    Ok(flat)
}

impl Trajectory {
    /// Builds a trajectory, validating the lengths of the fields.
    pub fn new(
        obs: Vec<Vec<f32>>,
        act: Vec<Vec<f32>>,
        reward: Vec<f32>,
        done: Vec<f32>,
        known: Vec<Vec<f32>>,
    ) -> Result<Self> {
        let len = act.len();
        if len == 0 {
            return Err(RrdError::MalformedTrajectory("no transitions".to_string()).into());
        }
        if obs.len() != len + 1
            || done.len() != len + 1
            || known.len() != len + 1
            || reward.len() != len
        {
            return Err(RrdError::MalformedTrajectory(format!(
                "obs: {}, act: {}, reward: {}, done: {}, known: {}",
                obs.len(),
                len,
                reward.len(),
                done.len(),
                known.len()
            ))
            .into());
        }
        let obs_dim = obs[0].len();
        let act_dim = act[0].len();

        Ok(Self {
            obs_dim,
            act_dim,
            obs: flatten(obs, obs_dim, "obs")?,
            act: flatten(act, act_dim, "act")?,
            known: flatten(known, obs_dim, "known")?,
            reward,
            done,
        })
    }

    /// The number of transitions.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Always `false`, a trajectory has at least one transition.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Dimension of observations.
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    /// Dimension of actions.
    pub fn act_dim(&self) -> usize {
        self.act_dim
    }

    /// Observation at `i`, `0 <= i <= len`.
    pub fn obs(&self, i: usize) -> &[f32] {
        &self.obs[i * self.obs_dim..(i + 1) * self.obs_dim]
    }

    /// Action at `i`, `0 <= i < len`.
    pub fn act(&self, i: usize) -> &[f32] {
        &self.act[i * self.act_dim..(i + 1) * self.act_dim]
    }

    /// Known-mask at `i`, `0 <= i <= len`.
    pub fn known(&self, i: usize) -> &[f32] {
        &self.known[i * self.obs_dim..(i + 1) * self.obs_dim]
    }

    /// Done flag at `i`, `0 <= i <= len`.
    pub fn done(&self, i: usize) -> f32 {
        self.done[i]
    }

    /// Rewards of the episode.
    pub fn rewards(&self) -> &[f32] {
        &self.reward
    }

    /// Iterator over the observations, including the bootstrap state.
    pub fn obs_rows(&self) -> std::slice::Chunks<'_, f32> {
        self.obs.chunks(self.obs_dim)
    }

    /// Mean of the rewards of the episode.
    pub fn mean_reward(&self) -> f32 {
        self.reward.iter().sum::<f32>() / self.reward.len() as f32
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.len() {
            return Err(RrdError::IndexOutOfRange {
                index: i,
                len: self.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Returns the transition starting at `i`.
    pub fn get_element(&self, i: usize) -> Result<Transition> {
        self.check_index(i)?;
        Ok(Transition {
            obs: self.obs(i).to_vec(),
            act: self.act(i).to_vec(),
            next_obs: self.obs(i + 1).to_vec(),
            next_done: self.done[i + 1],
            known: self.known(i).to_vec(),
            next_known: self.known(i + 1).to_vec(),
            reward: self.reward[i],
        })
    }

    /// Draws `k` transitions uniformly.
    ///
    /// Draws are with replacement only when `k` exceeds the length. The reward
    /// of the sub-sequence is the mean reward of the whole episode, which is the
    /// regression label of reward redistribution.
    pub fn sample_uniform(&self, k: usize, rng: &mut StdRng) -> Result<SubSequence> {
        let ixs = sample_indices(rng, self.len(), k);
        let mut sub = SubSequence::with_capacity(k, self.obs_dim, self.act_dim);
        for i in ixs {
            sub.push(self.get_element(i)?);
        }
        sub.reward = self.mean_reward();
        Ok(sub)
    }

    /// Inputs and target of state prediction at `i`.
    ///
    /// The features are the `(obs, act)` pairs of steps `max(0, i + 1 - context)`
    /// through `i`, oldest first. The label is `obs[i + 1] - obs[i]` and the mask
    /// is the known-mask of `obs[i + 1]`.
    pub fn retrieve_state_features(&self, i: usize, context: usize) -> Result<StateFeatures> {
        self.check_index(i)?;
        let start = (i + 1).saturating_sub(context.max(1));
        let mut features = Vec::with_capacity((i + 1 - start) * (self.obs_dim + self.act_dim));
        for t in start..=i {
            features.extend_from_slice(self.obs(t));
            features.extend_from_slice(self.act(t));
        }
        Ok(StateFeatures {
            features,
            len: i + 1 - start,
            label: sub(self.obs(i + 1), self.obs(i)),
            known: self.known(i + 1).to_vec(),
        })
    }
}
