use super::PaddedSequences;
use crate::{
    mlp::{Mlp, MlpConfig},
    model::SubModel1,
};
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;

/// Feed-forward model on the last `(obs, act)` pair of each sequence.
pub struct LastStepMlp {
    mlp: Mlp,
}

impl SubModel1 for LastStepMlp {
    type Config = MlpConfig;
    type Input = PaddedSequences;
    type Output = Tensor;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        Ok(Self {
            mlp: <Mlp as SubModel1>::build(vb, config)?,
        })
    }

    fn forward(&self, input: &Self::Input) -> Result<Tensor> {
        let xs = input.select_last(&input.feats)?;
        SubModel1::forward(&self.mlp, &xs)
    }
}
