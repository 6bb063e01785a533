//! Sequence model predicting the change of the observation.
use super::SequencePredictorConfig;
use crate::{
    model::SubModel1,
    opt::{GradClip, Optimizer},
    seq::PaddedSequences,
    util::{init_seeded, masked_mse, masked_mse_per_component, rows, scalar, track_with_replace_substring},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::{info, trace};
use rand::{rngs::StdRng, SeedableRng};
use rrd_core::{
    error::RrdError,
    record::{Record, RecordValue},
    trajectory_buffer::{StatePredictionBatch, TrajectoryBuffer},
    History, PredictorNet, StateEstimator,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

/// Predicts `obs[t + 1] - obs[t]` from the `(obs, act)` history up to `t`.
///
/// The model is trained on the known components of the next observation only.
/// A target copy follows the trained parameters by soft updates; rollouts read
/// the target copy and evaluation reads the trained parameters.
pub struct SequencePredictor<M>
where
    M: SubModel1<Input = PaddedSequences, Output = Tensor>,
    M::Config: DeserializeOwned + Serialize + Clone,
{
    device: Device,
    varmap: VarMap,
    varmap_tgt: VarMap,
    model: M,
    model_tgt: M,
    opt: Optimizer,
    batch_size: usize,
    n_batches: usize,
    tau: f64,
    grad_clip: GradClip,
    n_opts: usize,
}

impl<M> SequencePredictor<M>
where
    M: SubModel1<Input = PaddedSequences, Output = Tensor>,
    M::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`SequencePredictor`] with the target equal to the trained model.
    ///
    /// Initial parameters are drawn from a generator seeded with `config.seed`.
    pub fn build(config: SequencePredictorConfig<M::Config>) -> Result<Self> {
        let device: Device = config.device.context("No device is given for the state predictor")?.into();
        let model_config = config.model_config.context("model_config is not set.")?;

        let varmap = VarMap::new();
        let model = M::build(
            VarBuilder::from_varmap(&varmap, DType::F32, &device).set_prefix("state_pred"),
            model_config.clone(),
        )?;
        init_seeded(&varmap, &mut StdRng::seed_from_u64(config.seed))?;
        let varmap_tgt = VarMap::new();
        let model_tgt = M::build(
            VarBuilder::from_varmap(&varmap_tgt, DType::F32, &device).set_prefix("state_pred_tgt"),
            model_config,
        )?;
        track_with_replace_substring(&varmap_tgt, &varmap, 1.0, ("state_pred", "state_pred_tgt"))?;
        let opt = config.opt_config.build(varmap.all_vars())?;
        info!(
            "Built state predictor, batch_size = {}, n_batches = {}",
            config.batch_size, config.n_batches
        );

        Ok(Self {
            device,
            varmap,
            varmap_tgt,
            model,
            model_tgt,
            opt,
            batch_size: config.batch_size,
            n_batches: config.n_batches,
            tau: config.tau,
            grad_clip: config.grad_clip,
            n_opts: 0,
        })
    }

    /// Number of minibatch updates so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    fn model(&self, net: PredictorNet) -> &M {
        match net {
            PredictorNet::Online => &self.model,
            PredictorNet::Target => &self.model_tgt,
        }
    }

    /// Loss of the trained model on `batch` and the per-component loss.
    fn loss(&self, batch: &StatePredictionBatch) -> Result<(Tensor, Vec<f32>)> {
        let (n, obs_dim) = (batch.len(), batch.obs_dim);
        let input = PaddedSequences::from_batch(batch, &self.device)?;
        let labels = rows(&batch.labels, n, obs_dim, &self.device)?;
        let masks = rows(&batch.masks, n, obs_dim, &self.device)?;

        let preds = self.model.forward(&input)?;
        let loss = masked_mse(&preds, &labels, &masks)?;
        let per_component = masked_mse_per_component(&preds.detach(), &labels, &masks)?;
        Ok((loss, per_component))
    }

    /// One minibatch update, returns the loss and the per-component loss.
    fn update(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<(f32, Vec<f32>)> {
        let batch = buffer.sample_state_prediction_batch(self.batch_size, rng)?;
        let (loss, per_component) = self.loss(&batch)?;
        self.opt.backward_step_clip(&loss, &self.grad_clip)?;
        self.n_opts += 1;

        Ok((scalar(&loss)?, per_component))
    }
}

impl<M> StateEstimator for SequencePredictor<M>
where
    M: SubModel1<Input = PaddedSequences, Output = Tensor>,
    M::Config: DeserializeOwned + Serialize + Clone,
{
    fn is_enabled(&self) -> bool {
        true
    }

    fn predict_delta(&self, history: &History, net: PredictorNet) -> Result<Vec<f32>> {
        let input = PaddedSequences::from_history(history, &self.device)?;
        let pred = self.model(net).forward(&input)?.detach();
        let obs_dim = history.last_obs()?.len();
        let delta: Vec<f32> = pred.flatten_all()?.to_vec1()?;
        if delta.len() != obs_dim {
            return Err(RrdError::DimensionMismatch {
                context: "state predictor output".to_string(),
                expected: obs_dim,
                actual: delta.len(),
            }
            .into());
        }
        Ok(delta)
    }

    fn opt_with_record(&mut self, buffer: &TrajectoryBuffer, rng: &mut StdRng) -> Result<Record> {
        let mut record = Record::empty();
        for _ in 0..self.n_batches {
            trace!("state predictor update");
            let (loss, per_component) = self.update(buffer, rng)?;
            record.insert("loss_state", RecordValue::Scalar(loss));
            record.insert("state_loss_per_component", RecordValue::Array1(per_component));
        }
        Ok(record)
    }

    fn soft_update(&mut self) -> Result<()> {
        track_with_replace_substring(
            &self.varmap_tgt,
            &self.varmap,
            self.tau,
            ("state_pred", "state_pred_tgt"),
        )
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.varmap.save(path.join("state_pred.safetensors"))?;
        self.varmap_tgt.save(path.join("state_pred_tgt.safetensors"))?;
        info!("Save state predictor to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path.join("state_pred.safetensors"))?;
        self.varmap_tgt.load(path.join("state_pred_tgt.safetensors"))?;
        info!("Load state predictor from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        mlp::MlpConfig,
        seq::{LastStepMlp, LstmAttn, LstmAttnConfig},
    };
    use rrd_core::trajectory_buffer::{Trajectory, TrajectoryBufferConfig};
    use tempdir::TempDir;

    /// Observations `[t, 2 t]` with the second component hidden at odd steps.
    fn buffer() -> Result<TrajectoryBuffer> {
        let mut buffer = TrajectoryBuffer::build(&TrajectoryBufferConfig::default().context(3));
        for _ in 0..4 {
            let len = 10;
            let obs = (0..=len).map(|t| vec![t as f32 * 0.1, t as f32 * 0.2]).collect();
            let act = (0..len).map(|_| vec![0.5]).collect();
            let known = (0..=len)
                .map(|t| if t % 2 == 1 { vec![1.0, 0.0] } else { vec![1.0, 1.0] })
                .collect();
            buffer.add(Trajectory::new(obs, act, vec![1.0; len], vec![0.0; len + 1], known)?)?;
        }
        Ok(buffer)
    }

    fn lstm_predictor(seed: u64) -> Result<SequencePredictor<LstmAttn>> {
        let config = SequencePredictorConfig::default()
            .model_config(LstmAttnConfig::new(3, 2).hidden_size(8))
            .batch_size(16)
            .n_batches(3)
            .seed(seed)
            .device(Device::Cpu);
        SequencePredictor::build(config)
    }

    #[test]
    fn test_targets_follow_soft_updates() -> Result<()> {
        let mut pred = lstm_predictor(0)?;
        let obs = vec![vec![0.0, 0.0], vec![0.1, 0.2]];
        let act = vec![vec![0.5], vec![0.5]];
        let history = History::window(&obs, &act, 3);

        let online = pred.predict_delta(&history, PredictorNet::Online)?;
        let target = pred.predict_delta(&history, PredictorNet::Target)?;
        assert_eq!(online.len(), 2);
        assert_eq!(online, target);

        let record = pred.opt_with_record(&buffer()?, &mut StdRng::seed_from_u64(0))?;
        assert_eq!(pred.n_opts(), 3);
        assert!(record.get_scalar("loss_state")?.is_finite());
        assert_eq!(record.get_array1("state_loss_per_component")?.len(), 2);

        // The target is unchanged until a soft update.
        let online = pred.predict_delta(&history, PredictorNet::Online)?;
        assert_eq!(pred.predict_delta(&history, PredictorNet::Target)?, target);
        assert_ne!(online, target);
        pred.soft_update()?;
        assert_ne!(pred.predict_delta(&history, PredictorNet::Target)?, target);
        Ok(())
    }

    #[test]
    fn test_loss_decreases() -> Result<()> {
        let config = SequencePredictorConfig::default()
            .model_config(MlpConfig::new(3, vec![32], 2, false))
            .opt_config(crate::opt::OptimizerConfig::Adam { lr: 0.01 })
            .batch_size(40)
            .n_batches(1)
            .device(Device::Cpu);
        let mut pred = SequencePredictor::<LastStepMlp>::build(config)?;
        let buffer = buffer()?;
        let mut rng = StdRng::seed_from_u64(0);

        let first = pred.opt_with_record(&buffer, &mut rng)?.get_scalar("loss_state")?;
        let mut last = first;
        for _ in 0..200 {
            last = pred.opt_with_record(&buffer, &mut rng)?.get_scalar("loss_state")?;
        }
        assert!(last < first);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("state_pred")?;
        let a = lstm_predictor(1)?;
        let mut b = lstm_predictor(2)?;
        let obs = vec![vec![0.3, -0.1]];
        let act = vec![vec![0.2]];
        let history = History::window(&obs, &act, 3);
        assert_ne!(
            a.predict_delta(&history, PredictorNet::Online)?,
            b.predict_delta(&history, PredictorNet::Online)?
        );

        a.save_params(dir.path())?;
        b.load_params(dir.path())?;
        for net in [PredictorNet::Online, PredictorNet::Target] {
            assert_eq!(a.predict_delta(&history, net)?, b.predict_delta(&history, net)?);
        }
        Ok(())
    }

    #[test]
    fn test_masked_labels_do_not_change_updates() -> Result<()> {
        let mut a = lstm_predictor(3)?;
        let mut b = lstm_predictor(3)?;
        let batch_a = buffer()?.sample_state_prediction_batch(16, &mut StdRng::seed_from_u64(0))?;

        // Overwrite the labels of hidden components only.
        let mut batch_b = batch_a.clone();
        for (label, mask) in batch_b.labels.iter_mut().zip(batch_a.masks.iter()) {
            if *mask == 0.0 {
                *label = 1e3;
            }
        }
        assert!(batch_a.masks.iter().any(|m| *m == 0.0));
        assert_ne!(batch_a.labels, batch_b.labels);

        let (loss_a, per_component_a) = a.loss(&batch_a)?;
        let (loss_b, per_component_b) = b.loss(&batch_b)?;
        assert_eq!(scalar(&loss_a)?, scalar(&loss_b)?);
        assert_eq!(per_component_a, per_component_b);

        // The gradient steps are the same, so are the updated models.
        a.opt.backward_step_clip(&loss_a, &a.grad_clip)?;
        b.opt.backward_step_clip(&loss_b, &b.grad_clip)?;
        let obs = vec![vec![0.2, 0.4], vec![0.3, 0.0]];
        let act = vec![vec![0.5], vec![0.5]];
        let history = History::window(&obs, &act, 3);
        assert_eq!(
            a.predict_delta(&history, PredictorNet::Online)?,
            b.predict_delta(&history, PredictorNet::Online)?
        );
        Ok(())
    }

    #[test]
    fn test_seeded_build() -> Result<()> {
        let obs = vec![vec![0.2, 0.4]];
        let act = vec![vec![0.5]];
        let history = History::window(&obs, &act, 3);
        let delta = |seed| lstm_predictor(seed)?.predict_delta(&history, PredictorNet::Target);
        assert_eq!(delta(4)?, delta(4)?);
        assert_ne!(delta(4)?, delta(5)?);
        Ok(())
    }
}
