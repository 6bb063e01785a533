//! Samples drawn from a [`TrajectoryBuffer`](super::TrajectoryBuffer).

/// A transition `(o_t, a_t, o_t+1, r_t)` with done flag and known-masks.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation.
    pub obs: Vec<f32>,
    /// Action.
    pub act: Vec<f32>,
    /// Next observation.
    pub next_obs: Vec<f32>,
    /// Done flag of the next observation, 1 only for true termination.
    pub next_done: f32,
    /// Known-mask of the observation.
    pub known: Vec<f32>,
    /// Known-mask of the next observation.
    pub next_known: Vec<f32>,
    /// Reward.
    pub reward: f32,
}

/// Transitions collated into flat row-major vectors.
#[derive(Debug, Clone, Default)]
pub struct TransitionBatch {
    /// Observations, `len * obs_dim`.
    pub obs: Vec<f32>,
    /// Actions, `len * act_dim`.
    pub act: Vec<f32>,
    /// Next observations, `len * obs_dim`.
    pub next_obs: Vec<f32>,
    /// Done flags of next observations, `len`.
    pub next_done: Vec<f32>,
    /// Known-masks, `len * obs_dim`.
    pub known: Vec<f32>,
    /// Known-masks of next observations, `len * obs_dim`.
    pub next_known: Vec<f32>,
    /// Rewards, `len`.
    pub reward: Vec<f32>,
    /// Number of transitions.
    pub len: usize,
    /// Dimension of observations.
    pub obs_dim: usize,
    /// Dimension of actions.
    pub act_dim: usize,
}

impl TransitionBatch {
    pub(crate) fn with_capacity(n: usize, obs_dim: usize, act_dim: usize) -> Self {
        Self {
            obs: Vec::with_capacity(n * obs_dim),
            act: Vec::with_capacity(n * act_dim),
            next_obs: Vec::with_capacity(n * obs_dim),
            next_done: Vec::with_capacity(n),
            known: Vec::with_capacity(n * obs_dim),
            next_known: Vec::with_capacity(n * obs_dim),
            reward: Vec::with_capacity(n),
            len: 0,
            obs_dim,
            act_dim,
        }
    }

    pub(crate) fn push(&mut self, t: Transition) {
        self.obs.extend(t.obs);
        self.act.extend(t.act);
        self.next_obs.extend(t.next_obs);
        self.next_done.push(t.next_done);
        self.known.extend(t.known);
        self.next_known.extend(t.next_known);
        self.reward.push(t.reward);
        self.len += 1;
    }
}

impl From<Vec<Transition>> for TransitionBatch {
    fn from(transitions: Vec<Transition>) -> Self {
        let (obs_dim, act_dim) = transitions
            .first()
            .map(|t| (t.obs.len(), t.act.len()))
            .unwrap_or((0, 0));
        let mut batch = Self::with_capacity(transitions.len(), obs_dim, act_dim);
        transitions.into_iter().for_each(|t| batch.push(t));
        batch
    }
}

/// Transitions drawn from a single trajectory.
///
/// `reward` holds a single value, the mean reward of the trajectory.
pub type SubSequence = SubSequenceOf<f32>;

/// Sub-sequences of several trajectories, `rewards` has one entry per sub-sequence.
pub type SubSequenceBatch = SubSequenceOf<Vec<f32>>;

/// Transitions grouped by trajectory with one trajectory-level reward per group.
#[derive(Debug, Clone, Default)]
pub struct SubSequenceOf<R> {
    /// Observations, `n_subs * len * obs_dim`.
    pub obs: Vec<f32>,
    /// Actions, `n_subs * len * act_dim`.
    pub act: Vec<f32>,
    /// Next observations, `n_subs * len * obs_dim`.
    pub next_obs: Vec<f32>,
    /// Done flags of next observations, `n_subs * len`.
    pub next_done: Vec<f32>,
    /// Known-masks, `n_subs * len * obs_dim`.
    pub known: Vec<f32>,
    /// Known-masks of next observations, `n_subs * len * obs_dim`.
    pub next_known: Vec<f32>,
    /// Trajectory-level reward label(s).
    pub reward: R,
    /// Number of transitions per sub-sequence.
    pub len: usize,
    /// Dimension of observations.
    pub obs_dim: usize,
    /// Dimension of actions.
    pub act_dim: usize,
}

impl SubSequence {
    pub(crate) fn with_capacity(n: usize, obs_dim: usize, act_dim: usize) -> Self {
        let b = TransitionBatch::with_capacity(n, obs_dim, act_dim);
        Self {
            obs: b.obs,
            act: b.act,
            next_obs: b.next_obs,
            next_done: b.next_done,
            known: b.known,
            next_known: b.next_known,
            reward: 0.0,
            len: 0,
            obs_dim,
            act_dim,
        }
    }

    pub(crate) fn push(&mut self, t: Transition) {
        self.obs.extend(t.obs);
        self.act.extend(t.act);
        self.next_obs.extend(t.next_obs);
        self.next_done.push(t.next_done);
        self.known.extend(t.known);
        self.next_known.extend(t.next_known);
        self.len += 1;
    }
}

impl SubSequenceBatch {
    /// Number of sub-sequences.
    pub fn n_subs(&self) -> usize {
        self.reward.len()
    }
}

impl From<Vec<SubSequence>> for SubSequenceBatch {
    fn from(subs: Vec<SubSequence>) -> Self {
        let (len, obs_dim, act_dim) = subs
            .first()
            .map(|s| (s.len, s.obs_dim, s.act_dim))
            .unwrap_or((0, 0, 0));
        let mut batch = Self {
            len,
            obs_dim,
            act_dim,
            ..Self::default()
        };
        for s in subs {
            batch.obs.extend(s.obs);
            batch.act.extend(s.act);
            batch.next_obs.extend(s.next_obs);
            batch.next_done.extend(s.next_done);
            batch.known.extend(s.known);
            batch.next_known.extend(s.next_known);
            batch.reward.push(s.reward);
        }
        batch
    }
}

/// Inputs and target for state prediction at a single step.
#[derive(Debug, Clone, PartialEq)]
pub struct StateFeatures {
    /// `(obs, act)` pairs, oldest first, `len * (obs_dim + act_dim)`.
    pub features: Vec<f32>,
    /// Number of pairs.
    pub len: usize,
    /// `obs[i + 1] - obs[i]`.
    pub label: Vec<f32>,
    /// Known-mask of `obs[i + 1]`.
    pub known: Vec<f32>,
}

/// Variable-length feature sequences with their labels and target masks.
#[derive(Debug, Clone, Default)]
pub struct StatePredictionBatch {
    /// Feature sequences, one per sample.
    pub features: Vec<Vec<f32>>,
    /// Sequence lengths.
    pub lengths: Vec<usize>,
    /// Labels, `n * obs_dim`.
    pub labels: Vec<f32>,
    /// Target masks, `n * obs_dim`.
    pub masks: Vec<f32>,
    /// Dimension of a single `(obs, act)` feature.
    pub feature_dim: usize,
    /// Dimension of observations.
    pub obs_dim: usize,
}

impl StatePredictionBatch {
    pub(crate) fn new(feature_dim: usize, obs_dim: usize) -> Self {
        Self {
            feature_dim,
            obs_dim,
            ..Self::default()
        }
    }

    pub(crate) fn push(&mut self, f: StateFeatures) {
        self.features.push(f.features);
        self.lengths.push(f.len);
        self.labels.extend(f.label);
        self.masks.extend(f.known);
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// `true` if the batch has no sample.
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Length of the longest sequence.
    pub fn max_len(&self) -> usize {
        self.lengths.iter().copied().max().unwrap_or(0)
    }

    /// Features right-padded with zeros to `max_len`, `n * max_len * feature_dim`.
    ///
    /// Consumers must use [`Self::lengths`] to ignore the padding.
    pub fn padded(&self) -> Vec<f32> {
        let max_len = self.max_len();
        let mut out = Vec::with_capacity(self.len() * max_len * self.feature_dim);
        for f in self.features.iter() {
            out.extend_from_slice(f);
            out.resize(out.len() + max_len * self.feature_dim - f.len(), 0.0);
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_padded() {
        let mut batch = StatePredictionBatch::new(2, 1);
        batch.push(StateFeatures {
            features: vec![1.0, 2.0],
            len: 1,
            label: vec![0.5],
            known: vec![1.0],
        });
        batch.push(StateFeatures {
            features: vec![3.0, 4.0, 5.0, 6.0],
            len: 2,
            label: vec![-0.5],
            known: vec![0.0],
        });

        assert_eq!(batch.max_len(), 2);
        assert_eq!(
            batch.padded(),
            vec![1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(batch.masks, vec![1.0, 0.0]);
    }
}
