use super::PaddedSequences;
use crate::{model::SubModel1, util::OutDim};
use anyhow::{ensure, Result};
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, lstm, LSTMConfig, Linear, Module, VarBuilder, LSTM, RNN};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`LstmAttn`].
pub struct LstmAttnConfig {
    /// Dimension of the features at each step.
    pub in_dim: usize,

    /// Dimension of the hidden state of the LSTM.
    pub hidden_size: usize,

    /// Number of attention heads, a divisor of `hidden_size`.
    pub n_heads: usize,

    /// Dimension of the output.
    pub out_dim: usize,
}

impl LstmAttnConfig {
    /// Creates a configuration with 64 hidden units and 2 heads.
    pub fn new(in_dim: usize, out_dim: usize) -> Self {
        Self {
            in_dim,
            hidden_size: 64,
            n_heads: 2,
            out_dim,
        }
    }

    /// Sets the dimension of the hidden state.
    pub fn hidden_size(mut self, v: usize) -> Self {
        self.hidden_size = v;
        self
    }

    /// Sets the number of attention heads.
    pub fn n_heads(mut self, v: usize) -> Self {
        self.n_heads = v;
        self
    }
}

impl OutDim for LstmAttnConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, v: usize) {
        self.out_dim = v;
    }
}

/// LSTM followed by multi-head self-attention.
///
/// The LSTM outputs pass through a sigmoid and self-attention over the valid
/// steps; the attended vector at the last valid step goes through ReLU and a
/// linear output layer.
pub struct LstmAttn {
    config: LstmAttnConfig,
    device: Device,
    lstm: LSTM,
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    o_proj: Linear,
    out: Linear,
}

impl LstmAttn {
    /// `(b, t, hidden)` to `(b, n_heads, t, head_dim)`.
    fn split_heads(&self, xs: &Tensor) -> Result<Tensor> {
        let (b, t, _) = xs.dims3()?;
        let head_dim = self.config.hidden_size / self.config.n_heads;
        Ok(xs
            .reshape((b, t, self.config.n_heads, head_dim))?
            .transpose(1, 2)?
            .contiguous()?)
    }

    fn attention(&self, xs: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (b, t, hidden) = xs.dims3()?;
        let head_dim = hidden / self.config.n_heads;
        let q = self.split_heads(&self.q_proj.forward(xs)?)?;
        let k = self.split_heads(&self.k_proj.forward(xs)?)?;
        let v = self.split_heads(&self.v_proj.forward(xs)?)?;

        let scores = (q.matmul(&k.t()?.contiguous()?)? / (head_dim as f64).sqrt())?;
        let weights = candle_nn::ops::softmax(&scores.broadcast_add(mask)?, D::Minus1)?;
        let ys = weights.matmul(&v)?.transpose(1, 2)?.reshape((b, t, hidden))?;
        Ok(self.o_proj.forward(&ys)?)
    }
}

impl SubModel1 for LstmAttn {
    type Config = LstmAttnConfig;
    type Input = PaddedSequences;
    type Output = Tensor;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        ensure!(
            config.n_heads > 0 && config.hidden_size % config.n_heads == 0,
            "hidden_size {} is not divisible by n_heads {}",
            config.hidden_size,
            config.n_heads
        );
        let h = config.hidden_size;
        let lstm = lstm(config.in_dim, h, LSTMConfig::default(), vb.pp("lstm"))?;
        let q_proj = linear(h, h, vb.pp("attn").pp("q_proj"))?;
        let k_proj = linear(h, h, vb.pp("attn").pp("k_proj"))?;
        let v_proj = linear(h, h, vb.pp("attn").pp("v_proj"))?;
        let o_proj = linear(h, h, vb.pp("attn").pp("o_proj"))?;
        let out = linear(h, config.out_dim, vb.pp("out"))?;

        Ok(Self {
            config,
            device: vb.device().clone(),
            lstm,
            q_proj,
            k_proj,
            v_proj,
            o_proj,
            out,
        })
    }

    fn forward(&self, input: &Self::Input) -> Result<Tensor> {
        let feats = input.feats.to_device(&self.device)?;
        let states = self.lstm.seq(&feats)?;
        let hs = self.lstm.states_to_tensor(&states)?;

        // sigmoid
        let hs = (hs.neg()?.exp()? + 1.0)?.recip()?;
        let ys = self.attention(&hs, &input.key_padding_mask()?)?;
        let ys = input.select_last(&ys)?.relu()?;
        Ok(self.out.forward(&ys)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    fn model() -> Result<LstmAttn> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        LstmAttn::build(vb, LstmAttnConfig::new(3, 2).hidden_size(8))
    }

    #[test]
    fn test_output_shape() -> Result<()> {
        let model = model()?;
        let feats = Tensor::ones((4, 5, 3), DType::F32, &Device::Cpu)?;
        let input = PaddedSequences {
            feats,
            lengths: vec![1, 5, 3, 2],
        };
        assert_eq!(model.forward(&input)?.dims(), &[4, 2]);
        Ok(())
    }

    #[test]
    fn test_padding_is_ignored() -> Result<()> {
        let model = model()?;
        let valid = [0.1f32, 0.2, 0.3, -0.4, 0.5, 0.6];

        // The same two steps without padding and with garbage padding.
        let short = PaddedSequences {
            feats: Tensor::from_slice(&valid, (1, 2, 3), &Device::Cpu)?,
            lengths: vec![2],
        };
        let mut padded_vals = valid.to_vec();
        padded_vals.extend_from_slice(&[9.0, 9.0, 9.0, -7.0, 7.0, 7.0]);
        let padded = PaddedSequences {
            feats: Tensor::from_vec(padded_vals, (1, 4, 3), &Device::Cpu)?,
            lengths: vec![2],
        };

        let a: Vec<Vec<f32>> = model.forward(&short)?.to_vec2()?;
        let b: Vec<Vec<f32>> = model.forward(&padded)?.to_vec2()?;
        for (x, y) in a[0].iter().zip(b[0].iter()) {
            assert!((x - y).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_heads() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = LstmAttnConfig::new(3, 2).hidden_size(7);
        assert!(LstmAttn::build(vb, config).is_err());
    }
}
