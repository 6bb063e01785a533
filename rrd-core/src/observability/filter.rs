//! Per-episode masking of body parts.
use super::BodyPartition;
use crate::error::RrdError;
use anyhow::Result;
use log::debug;
use rand::{rngs::StdRng, seq::index};
use serde::{Deserialize, Serialize};

/// Configuration of [`ObservabilityFilter`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ObservabilityFilterConfig {
    /// Number of body parts hidden at once. `0` disables masking.
    pub num_hidden: usize,

    /// Number of consecutive steps a choice of hidden parts persists.
    pub consecutive_hidden: usize,
}

impl Default for ObservabilityFilterConfig {
    fn default() -> Self {
        Self {
            num_hidden: 0,
            consecutive_hidden: 1,
        }
    }
}

impl ObservabilityFilterConfig {
    /// Sets the number of hidden parts.
    pub fn num_hidden(mut self, v: usize) -> Self {
        self.num_hidden = v;
        self
    }

    /// Sets the number of steps a mask persists.
    pub fn consecutive_hidden(mut self, v: usize) -> Self {
        self.consecutive_hidden = v;
        self
    }
}

/// State of the mask of the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskState {
    /// Every component is visible.
    Visible,

    /// Parts are hidden, a new choice is drawn when `remaining <= 1`.
    Hidden {
        /// Steps left before the choice expires.
        remaining: usize,
    },
}

/// A masked observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    /// Observation with hidden components set to zero.
    pub obs: Vec<f32>,

    /// Known-mask, `1` for visible and `0` for hidden components.
    pub known: Vec<f32>,

    /// `true` if the hidden parts were drawn at this step.
    pub refreshed: bool,
}

/// Hides randomly chosen body parts of observations.
///
/// Every `consecutive_hidden` steps `num_hidden` distinct parts are drawn
/// uniformly; in between, the previous mask is reused.
pub struct ObservabilityFilter {
    partition: BodyPartition,
    num_hidden: usize,
    consecutive_hidden: usize,
    known: Vec<f32>,
    remaining: usize,
}

impl ObservabilityFilter {
    /// Builds a filter for observations of dimension `obs_dim`.
    pub fn build(
        config: &ObservabilityFilterConfig,
        partition: BodyPartition,
        obs_dim: usize,
    ) -> Result<Self> {
        partition.validate(obs_dim)?;
        if config.num_hidden > partition.n_parts() {
            return Err(RrdError::InvalidConfig(format!(
                "cannot hide {} of {} parts",
                config.num_hidden,
                partition.n_parts()
            ))
            .into());
        }
        Ok(Self {
            partition,
            num_hidden: config.num_hidden,
            consecutive_hidden: config.consecutive_hidden,
            known: vec![1.0; obs_dim],
            remaining: 0,
        })
    }

    /// Makes every component visible, called at the start of each episode.
    pub fn reset(&mut self) {
        self.known.iter_mut().for_each(|k| *k = 1.0);
        self.remaining = 0;
    }

    /// The current known-mask.
    pub fn known(&self) -> &[f32] {
        &self.known
    }

    /// The state of the mask.
    pub fn state(&self) -> MaskState {
        match self.known.iter().all(|&k| k == 1.0) {
            true => MaskState::Visible,
            false => MaskState::Hidden {
                remaining: self.remaining,
            },
        }
    }

    /// Masks `obs` and advances the countdown.
    pub fn filter(&mut self, obs: &[f32], rng: &mut StdRng) -> Result<Filtered> {
        if obs.len() != self.known.len() {
            return Err(RrdError::DimensionMismatch {
                context: "observability filter".to_string(),
                expected: self.known.len(),
                actual: obs.len(),
            }
            .into());
        }
        if self.num_hidden == 0 {
            return Ok(Filtered {
                obs: obs.to_vec(),
                known: vec![1.0; obs.len()],
                refreshed: false,
            });
        }

        let refreshed = self.remaining <= 1;
        if refreshed {
            self.known.iter_mut().for_each(|k| *k = 1.0);
            let parts = index::sample(rng, self.partition.n_parts(), self.num_hidden);
            for p in parts.iter() {
                for &ix in self.partition.part(p) {
                    self.known[ix] = 0.0;
                }
            }
            self.remaining = self.consecutive_hidden;
            debug!("Hidden parts: {:?}", parts.into_vec());
        } else {
            self.remaining -= 1;
        }

        Ok(Filtered {
            obs: obs.iter().zip(self.known.iter()).map(|(o, k)| o * k).collect(),
            known: self.known.clone(),
            refreshed,
        })
    }
}
