//! Sequence models over variable-length `(obs, act)` histories.
//!
//! Inputs are right-padded batches, [`PaddedSequences`]. Models read the
//! sequences up to their lengths and output one vector per sequence.
mod last_step;
mod lstm_attn;
use anyhow::{ensure, Result};
use candle_core::{Device, Tensor};
pub use last_step::LastStepMlp;
pub use lstm_attn::{LstmAttn, LstmAttnConfig};
use rrd_core::{trajectory_buffer::StatePredictionBatch, History};

/// Right-padded feature sequences with their lengths.
pub struct PaddedSequences {
    /// Features, `(batch_size, max_len, feature_dim)`.
    pub feats: Tensor,

    /// Lengths of the sequences, all in `1..=max_len`.
    pub lengths: Vec<usize>,
}

impl PaddedSequences {
    /// Features of a batch sampled for state prediction.
    pub fn from_batch(batch: &StatePredictionBatch, device: &Device) -> Result<Self> {
        ensure!(!batch.is_empty(), "Empty state prediction batch");
        ensure!(
            batch.lengths.iter().all(|&l| l > 0),
            "State prediction sequences must not be empty"
        );
        let feats = Tensor::from_vec(
            batch.padded(),
            (batch.len(), batch.max_len(), batch.feature_dim),
            device,
        )?;
        Ok(Self {
            feats,
            lengths: batch.lengths.clone(),
        })
    }

    /// A batch of the single sequence given by a history.
    pub fn from_history(history: &History, device: &Device) -> Result<Self> {
        ensure!(!history.is_empty(), "Empty history");
        let len = history.len();
        let mut feats = vec![];
        for (o, a) in history.obs.iter().zip(history.act.iter()) {
            feats.extend_from_slice(o);
            feats.extend_from_slice(a);
        }
        let feature_dim = feats.len() / len;
        let feats = Tensor::from_vec(feats, (1, len, feature_dim), device)?;
        Ok(Self {
            feats,
            lengths: vec![len],
        })
    }

    /// Number of sequences.
    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Length of the padded time axis.
    pub fn max_len(&self) -> Result<usize> {
        Ok(self.feats.dim(1)?)
    }

    /// One-hot weights of the last valid step, `(batch_size, max_len, 1)`.
    pub fn last_step_selector(&self) -> Result<Tensor> {
        let max_len = self.max_len()?;
        let mut w = vec![0f32; self.batch_size() * max_len];
        for (i, &l) in self.lengths.iter().enumerate() {
            w[i * max_len + l - 1] = 1.0;
        }
        Ok(Tensor::from_vec(
            w,
            (self.batch_size(), max_len, 1),
            self.feats.device(),
        )?)
    }

    /// Additive attention mask, 0 on valid steps and a large negative value
    /// on padding, `(batch_size, 1, 1, max_len)`.
    pub fn key_padding_mask(&self) -> Result<Tensor> {
        let max_len = self.max_len()?;
        let mut m = vec![0f32; self.batch_size() * max_len];
        for (i, &l) in self.lengths.iter().enumerate() {
            for v in m[i * max_len + l..(i + 1) * max_len].iter_mut() {
                *v = -1e9;
            }
        }
        Ok(Tensor::from_vec(
            m,
            (self.batch_size(), 1, 1, max_len),
            self.feats.device(),
        )?)
    }

    /// Values at the last valid step of each sequence, `(batch_size, dim)`.
    pub fn select_last(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(xs.broadcast_mul(&self.last_step_selector()?)?.sum(1)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_select_last() -> Result<()> {
        // Two sequences of lengths 1 and 3, feature_dim 2.
        let feats = Tensor::from_vec(
            vec![1f32, 1., 0., 0., 0., 0., 2., 2., 3., 3., 4., 4.],
            (2, 3, 2),
            &Device::Cpu,
        )?;
        let seqs = PaddedSequences {
            feats,
            lengths: vec![1, 3],
        };
        let last: Vec<Vec<f32>> = seqs.select_last(&seqs.feats)?.to_vec2()?;
        assert_eq!(last, vec![vec![1.0, 1.0], vec![4.0, 4.0]]);

        let mask: Vec<f32> = seqs.key_padding_mask()?.flatten_all()?.to_vec1()?;
        assert_eq!(mask, vec![0.0, -1e9, -1e9, 0.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_from_history() -> Result<()> {
        let obs = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let act = vec![vec![0.5], vec![-0.5]];
        let seqs = PaddedSequences::from_history(&History::window(&obs, &act, 20), &Device::Cpu)?;
        assert_eq!(seqs.feats.dims(), &[1, 2, 3]);
        assert_eq!(seqs.lengths, vec![2]);

        let empty = History::window(&obs[..0], &act[..0], 20);
        assert!(PaddedSequences::from_history(&empty, &Device::Cpu).is_err());
        Ok(())
    }
}
