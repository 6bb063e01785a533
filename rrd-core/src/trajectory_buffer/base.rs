//! Bounded FIFO collection of trajectories.
use super::{
    StatePredictionBatch, SubSequence, SubSequenceBatch, Trajectory, TrajectoryBufferConfig,
    Transition,
};
use crate::{error::RrdError, util::sample_indices};
use anyhow::Result;
use log::trace;
use rand::rngs::StdRng;
use std::collections::VecDeque;

/// A bounded FIFO collection of [`Trajectory`].
///
/// Global transition indices `0..len()` are resolved to `(trajectory, offset)`
/// with `splits`, the prefix sums of trajectory lengths: trajectory `t` owns
/// the indices `splits[t - 1]..splits[t]` (with `splits[-1] = 0`).
pub struct TrajectoryBuffer {
    capacity: usize,
    context: usize,
    trajectories: VecDeque<Trajectory>,
    splits: VecDeque<usize>,
    count: usize,
    state_min: Vec<f32>,
    state_max: Vec<f32>,
}

impl TrajectoryBuffer {
    /// Builds an empty buffer.
    pub fn build(config: &TrajectoryBufferConfig) -> Self {
        Self {
            capacity: config.capacity,
            context: config.context,
            trajectories: VecDeque::new(),
            splits: VecDeque::new(),
            count: 0,
            state_min: vec![],
            state_max: vec![],
        }
    }

    /// The number of transitions in the buffer.
    pub fn len(&self) -> usize {
        self.count
    }

    /// `true` if the buffer has no transition.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The number of trajectories in the buffer.
    pub fn n_trajectories(&self) -> usize {
        self.trajectories.len()
    }

    /// Cumulative trajectory lengths.
    pub fn splits(&self) -> Vec<usize> {
        self.splits.iter().copied().collect()
    }

    /// Trajectories, oldest first.
    pub fn trajectories(&self) -> impl Iterator<Item = &Trajectory> {
        self.trajectories.iter()
    }

    /// Component-wise minimum and maximum of every observation inserted so far.
    ///
    /// Evicted trajectories are not forgotten.
    pub fn state_range(&self) -> Option<(&[f32], &[f32])> {
        match self.state_min.is_empty() {
            true => None,
            false => Some((&self.state_min, &self.state_max)),
        }
    }

    /// Appends a trajectory, evicting the oldest one if the capacity is exceeded.
    pub fn add(&mut self, trajectory: Trajectory) -> Result<()> {
        if let Some(first) = self.trajectories.front() {
            for (context, expected, actual) in [
                ("obs", first.obs_dim(), trajectory.obs_dim()),
                ("act", first.act_dim(), trajectory.act_dim()),
            ] {
                if expected != actual {
                    return Err(RrdError::DimensionMismatch {
                        context: context.to_string(),
                        expected,
                        actual,
                    }
                    .into());
                }
            }
        }

        self.update_state_range(&trajectory);
        self.count += trajectory.len();
        self.splits.push_back(self.count);
        self.trajectories.push_back(trajectory);

        if self.count > self.capacity {
            self.evict_oldest();
        }

        self.check_invariants()
    }

    fn update_state_range(&mut self, trajectory: &Trajectory) {
        if self.state_min.is_empty() {
            self.state_min = trajectory.obs(0).to_vec();
            self.state_max = trajectory.obs(0).to_vec();
        }
        for row in trajectory.obs_rows() {
            for (i, &x) in row.iter().enumerate() {
                self.state_min[i] = self.state_min[i].min(x);
                self.state_max[i] = self.state_max[i].max(x);
            }
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(evicted) = self.trajectories.pop_front() {
            let n = evicted.len();
            self.splits.pop_front();
            self.splits.iter_mut().for_each(|s| *s -= n);
            self.count -= n;
            trace!("Evicted a trajectory of length {}", n);
        }
    }

    /// Checks that `splits` are the prefix sums of the trajectory lengths.
    pub fn check_invariants(&self) -> Result<()> {
        if self.splits.len() != self.trajectories.len() {
            return Err(RrdError::BrokenInvariant(format!(
                "{} splits for {} trajectories",
                self.splits.len(),
                self.trajectories.len()
            ))
            .into());
        }
        let mut sum = 0;
        for (i, (t, &s)) in self.trajectories.iter().zip(self.splits.iter()).enumerate() {
            sum += t.len();
            if s != sum {
                return Err(RrdError::BrokenInvariant(format!(
                    "splits[{}] = {}, expected {}",
                    i, s, sum
                ))
                .into());
            }
        }
        if sum != self.count {
            return Err(RrdError::BrokenInvariant(format!(
                "count = {}, sum of lengths = {}",
                self.count, sum
            ))
            .into());
        }
        Ok(())
    }

    /// Maps ascending global indices to `(trajectory, offset)` pairs.
    ///
    /// A single pointer walks forward over `splits`, so `indices` must be sorted.
    pub fn resolve(&self, indices: &[usize]) -> Result<Vec<(usize, usize)>> {
        let mut t = 0;
        let mut out = Vec::with_capacity(indices.len());
        for &index in indices {
            while t < self.splits.len() && index >= self.splits[t] {
                t += 1;
            }
            if t == self.splits.len() {
                return Err(RrdError::IndexOutOfRange {
                    index,
                    len: self.count,
                }
                .into());
            }
            let start = if t == 0 { 0 } else { self.splits[t - 1] };
            let offset = index
                .checked_sub(start)
                .ok_or(RrdError::NegativeOffset { index, trajectory: t })?;
            out.push((t, offset));
        }
        Ok(out)
    }

    fn sample_locations(&self, k: usize, rng: &mut StdRng) -> Result<Vec<(usize, usize)>> {
        if self.is_empty() {
            return Err(RrdError::EmptyBuffer.into());
        }
        let mut ixs = sample_indices(rng, self.count, k);
        ixs.sort_unstable();
        self.resolve(&ixs)
    }

    /// Draws `k` transitions uniformly, with replacement if `k > len()`.
    pub fn sample_transitions(&self, k: usize, rng: &mut StdRng) -> Result<Vec<Transition>> {
        self.sample_locations(k, rng)?
            .into_iter()
            .map(|(t, i)| self.trajectories[t].get_element(i))
            .collect()
    }

    /// Draws `num_subs` trajectories and `sub_len` transitions from each.
    ///
    /// Trajectories are drawn with replacement if `num_subs` exceeds their number.
    pub fn sample_sub_sequences(
        &self,
        sub_len: usize,
        num_subs: usize,
        rng: &mut StdRng,
    ) -> Result<SubSequenceBatch> {
        if self.is_empty() {
            return Err(RrdError::EmptyBuffer.into());
        }
        let subs = sample_indices(rng, self.trajectories.len(), num_subs)
            .into_iter()
            .map(|t| self.trajectories[t].sample_uniform(sub_len, rng))
            .collect::<Result<Vec<SubSequence>>>()?;
        Ok(subs.into())
    }

    /// Draws `k` state prediction samples, with replacement if `k > len()`.
    pub fn sample_state_prediction_batch(
        &self,
        k: usize,
        rng: &mut StdRng,
    ) -> Result<StatePredictionBatch> {
        let locations = self.sample_locations(k, rng)?;
        let first = &self.trajectories[0];
        let mut batch =
            StatePredictionBatch::new(first.obs_dim() + first.act_dim(), first.obs_dim());
        for (t, i) in locations {
            batch.push(self.trajectories[t].retrieve_state_features(i, self.context)?);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    /// A trajectory of length `len` whose observations are `base + t`.
    fn trajectory(len: usize, base: f32) -> Trajectory {
        let obs = (0..=len).map(|t| vec![base + t as f32, -(base + t as f32)]).collect();
        let act = (0..len).map(|t| vec![t as f32]).collect();
        let reward = vec![1.0; len];
        let done = vec![0.0; len + 1];
        let known = vec![vec![1.0, 1.0]; len + 1];
        Trajectory::new(obs, act, reward, done, known).unwrap()
    }

    fn buffer(capacity: usize) -> TrajectoryBuffer {
        TrajectoryBuffer::build(&TrajectoryBufferConfig::default().capacity(capacity).context(4))
    }

    #[test]
    fn test_eviction_rebases_splits() -> Result<()> {
        let mut buffer = buffer(100);
        buffer.add(trajectory(60, 0.0))?;
        assert_eq!(buffer.len(), 60);
        assert_eq!(buffer.splits(), vec![60]);

        buffer.add(trajectory(50, 100.0))?;
        assert_eq!(buffer.len(), 50);
        assert_eq!(buffer.splits(), vec![50]);
        assert_eq!(buffer.n_trajectories(), 1);
        Ok(())
    }

    #[test]
    fn test_evicts_at_most_one() -> Result<()> {
        let mut buffer = buffer(10);
        for _ in 0..3 {
            buffer.add(trajectory(3, 0.0))?;
        }
        buffer.add(trajectory(9, 0.0))?;
        // 18 transitions, only the oldest trajectory is dropped.
        assert_eq!(buffer.len(), 15);
        assert_eq!(buffer.splits(), vec![3, 6, 15]);
        Ok(())
    }

    #[test]
    fn test_invariants_after_many_inserts() -> Result<()> {
        let mut buffer = buffer(50);
        let mut rng = StdRng::seed_from_u64(3);
        for i in 0..40 {
            let len = 1 + (i * 7) % 13;
            buffer.add(trajectory(len, i as f32))?;
            buffer.check_invariants()?;

            let splits = buffer.splits();
            assert!(splits.windows(2).all(|w| w[0] < w[1]));
            let sum: usize = buffer.trajectories().map(|t| t.len()).sum();
            assert_eq!(sum, buffer.len());

            let k = buffer.len();
            for (t, i) in buffer.sample_locations(k, &mut rng)? {
                assert!(i < buffer.trajectories[t].len());
            }
        }
        Ok(())
    }

    #[test]
    fn test_resolve() -> Result<()> {
        let mut buffer = buffer(100);
        buffer.add(trajectory(5, 0.0))?;
        buffer.add(trajectory(5, 0.0))?;

        assert_eq!(
            buffer.resolve(&[0, 4, 5, 9])?,
            vec![(0, 0), (0, 4), (1, 0), (1, 4)]
        );

        let err = buffer.resolve(&[7, 2]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RrdError>(),
            Some(RrdError::NegativeOffset { index: 2, trajectory: 1 })
        ));

        let err = buffer.resolve(&[10]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RrdError>(),
            Some(RrdError::IndexOutOfRange { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_state_range_is_monotonic() -> Result<()> {
        let mut buffer = buffer(8);
        assert!(buffer.state_range().is_none());

        buffer.add(trajectory(4, 10.0))?;
        let (min, max) = buffer.state_range().unwrap();
        assert_eq!(min, &[10.0, -14.0]);
        assert_eq!(max, &[14.0, -10.0]);

        // Evicts the first trajectory but keeps its extremes.
        buffer.add(trajectory(6, 12.0))?;
        let (min, max) = buffer.state_range().unwrap();
        assert_eq!(min, &[10.0, -18.0]);
        assert_eq!(max, &[18.0, -10.0]);
        Ok(())
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = buffer(10);
        let mut rng = StdRng::seed_from_u64(0);
        for res in [
            buffer.sample_transitions(1, &mut rng).map(|_| ()),
            buffer.sample_sub_sequences(4, 2, &mut rng).map(|_| ()),
            buffer.sample_state_prediction_batch(1, &mut rng).map(|_| ()),
        ] {
            assert!(matches!(
                res.unwrap_err().downcast_ref::<RrdError>(),
                Some(RrdError::EmptyBuffer)
            ));
        }
    }

    #[test]
    fn test_sampling_shapes() -> Result<()> {
        let mut buffer = buffer(100);
        buffer.add(trajectory(5, 0.0))?;
        buffer.add(trajectory(7, 50.0))?;
        let mut rng = StdRng::seed_from_u64(1);

        let ts = buffer.sample_transitions(30, &mut rng)?;
        assert_eq!(ts.len(), 30);
        for t in ts.iter() {
            assert_eq!(t.next_obs[0] - t.obs[0], 1.0);
        }

        let subs = buffer.sample_sub_sequences(3, 4, &mut rng)?;
        assert_eq!(subs.n_subs(), 4);
        assert_eq!(subs.len, 3);
        assert_eq!(subs.obs.len(), 4 * 3 * 2);
        assert_eq!(subs.act.len(), 4 * 3);
        assert_eq!(subs.reward, vec![1.0; 4]);

        let batch = buffer.sample_state_prediction_batch(6, &mut rng)?;
        assert_eq!(batch.len(), 6);
        assert_eq!(batch.feature_dim, 3);
        assert!(batch.lengths.iter().all(|&l| (1..=4).contains(&l)));
        assert_eq!(batch.labels, vec![1.0, -1.0].repeat(6));
        Ok(())
    }
}
