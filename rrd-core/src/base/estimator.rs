//! State estimation from observation history.
use crate::{error::RrdError, record::Record, trajectory_buffer::TrajectoryBuffer};
use anyhow::Result;
use rand::rngs::StdRng;
use std::path::Path;

/// Selects the parameters used for prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorNet {
    /// The trained parameters.
    Online,

    /// The soft-updated copy.
    Target,
}

/// Recent `(obs, act)` pairs of an episode, oldest first.
///
/// `obs[i]` is the observation on which `act[i]` was taken.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    /// Observations.
    pub obs: &'a [Vec<f32>],

    /// Actions.
    pub act: &'a [Vec<f32>],
}

impl<'a> History<'a> {
    /// The last `context` pairs of `obs` and `act`.
    ///
    /// Both slices are aligned at their ends. A `context` of 0 is taken as 1,
    /// as in the state features of the buffer.
    pub fn window(obs: &'a [Vec<f32>], act: &'a [Vec<f32>], context: usize) -> Self {
        let n = context.max(1).min(obs.len()).min(act.len());
        Self {
            obs: &obs[obs.len() - n..],
            act: &act[act.len() - n..],
        }
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.obs.len()
    }

    /// `true` if there is no pair.
    pub fn is_empty(&self) -> bool {
        self.obs.is_empty()
    }

    /// The most recent observation.
    pub fn last_obs(&self) -> Result<&'a [f32]> {
        self.obs
            .last()
            .map(|o| o.as_slice())
            .ok_or_else(|| RrdError::IndexOutOfRange { index: 0, len: 0 }.into())
    }
}

/// Estimates the current observation from the history of an episode.
pub trait StateEstimator {
    /// `true` if a learned model backs the estimate.
    fn is_enabled(&self) -> bool;

    /// Predicts the change of the observation over the last action.
    fn predict_delta(&self, history: &History, net: PredictorNet) -> Result<Vec<f32>>;

    /// Belief of the next observation, the last observation plus the predicted change.
    fn belief(&self, history: &History, net: PredictorNet) -> Result<Vec<f32>> {
        let last = history.last_obs()?;
        let delta = self.predict_delta(history, net)?;
        if delta.len() != last.len() {
            return Err(RrdError::DimensionMismatch {
                context: "predicted state change".to_string(),
                expected: last.len(),
                actual: delta.len(),
            }
            .into());
        }
        Ok(last.iter().zip(delta.iter()).map(|(o, d)| o + d).collect())
    }

    /// Trains the model on samples of `buffer` and returns losses.
    fn opt_with_record(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<Record>;

    /// Moves the target parameters toward the online parameters.
    fn soft_update(&mut self) -> Result<()>;

    /// Save the parameters in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}

/// Assumes hidden components did not change since they were last seen.
#[derive(Debug, Default, Clone)]
pub struct NoPredictor;

impl StateEstimator for NoPredictor {
    fn is_enabled(&self) -> bool {
        false
    }

    fn predict_delta(&self, history: &History, _net: PredictorNet) -> Result<Vec<f32>> {
        Ok(vec![0.0; history.last_obs()?.len()])
    }

    fn opt_with_record(&mut self, _buffer: &TrajectoryBuffer, _rng: &mut StdRng) -> Result<Record> {
        Ok(Record::empty())
    }

    fn soft_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn save_params(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load_params(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Replaces hidden components with zeros.
#[derive(Debug, Default, Clone)]
pub struct ZeroFill;

impl StateEstimator for ZeroFill {
    fn is_enabled(&self) -> bool {
        false
    }

    fn predict_delta(&self, history: &History, _net: PredictorNet) -> Result<Vec<f32>> {
        Ok(history.last_obs()?.iter().map(|o| -o).collect())
    }

    fn opt_with_record(&mut self, _buffer: &TrajectoryBuffer, _rng: &mut StdRng) -> Result<Record> {
        Ok(Record::empty())
    }

    fn soft_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn save_params(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load_params(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_window() {
        let obs: Vec<Vec<f32>> = (0..5).map(|t| vec![t as f32]).collect();
        let act: Vec<Vec<f32>> = (0..5).map(|t| vec![-(t as f32)]).collect();

        let h = History::window(&obs, &act, 3);
        assert_eq!(h.len(), 3);
        assert_eq!(h.obs[0], vec![2.0]);
        assert_eq!(h.act[2], vec![-4.0]);

        let h = History::window(&obs[..2], &act[..2], 3);
        assert_eq!(h.len(), 2);

        let h = History::window(&obs, &act, 0);
        assert_eq!(h.len(), 1);
        assert_eq!(h.obs[0], vec![4.0]);
        assert!(History::window(&obs[..0], &act[..0], 0).is_empty());
    }

    #[test]
    fn test_no_predictor_keeps_last_obs() -> Result<()> {
        let obs = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let act = vec![vec![0.0], vec![0.0]];
        let h = History::window(&obs, &act, 20);

        let belief = NoPredictor.belief(&h, PredictorNet::Target)?;
        assert_eq!(belief, vec![3.0, 4.0]);
        assert!(!NoPredictor.is_enabled());

        let empty = History::window(&obs[..0], &act[..0], 20);
        assert!(NoPredictor.belief(&empty, PredictorNet::Online).is_err());
        Ok(())
    }

    #[test]
    fn test_zero_fill() -> Result<()> {
        let obs = vec![vec![1.0, -2.0]];
        let act = vec![vec![0.5]];
        let h = History::window(&obs, &act, 20);
        assert_eq!(ZeroFill.belief(&h, PredictorNet::Target)?, vec![0.0, 0.0]);
        Ok(())
    }
}
