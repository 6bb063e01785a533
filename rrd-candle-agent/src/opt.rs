//! Optimizers.
use anyhow::Result;
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training neural networks in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// AdamW optimizer.
    AdamW {
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },

    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs an optimizer of the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    weight_decay: *weight_decay,
                };
                let opt = AdamW::new(vars.clone(), params)?;
                Ok(Optimizer::AdamW(opt, vars))
            }
            OptimizerConfig::Adam { lr } => {
                let params = ParamsAdam {
                    lr: *lr,
                    ..ParamsAdam::default()
                };
                let opt = Adam::new(vars.clone(), params)?;
                Ok(Optimizer::Adam(opt, vars))
            }
        }
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::AdamW {
                lr: _,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => Self::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            },
            Self::Adam { lr: _ } => Self::Adam { lr },
        }
    }

    /// Returns the learning rate.
    pub fn lr(&self) -> f64 {
        match self {
            Self::AdamW { lr, .. } => *lr,
            Self::Adam { lr } => *lr,
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 0.0003 }
    }
}

/// Gradient clipping applied before an optimization step.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub enum GradClip {
    /// No clipping.
    None,

    /// Clamps each element of the gradients into `[-v, v]`.
    Value(f64),

    /// Rescales the gradients so that their global L2 norm is at most `v`.
    Norm(f64),
}

impl Default for GradClip {
    fn default() -> Self {
        Self::Value(1.0)
    }
}

impl GradClip {
    /// Clips the gradients of `vars` in `grads`.
    pub fn apply(&self, grads: &mut GradStore, vars: &[Var]) -> Result<()> {
        match *self {
            Self::None => {}
            Self::Value(v) => {
                for var in vars.iter() {
                    let clipped = match grads.get(var.as_tensor()) {
                        Some(g) => g.clamp(-v, v)?,
                        None => continue,
                    };
                    grads.insert(var.as_tensor(), clipped);
                }
            }
            Self::Norm(max_norm) => {
                let mut sq_sum = 0f64;
                for var in vars.iter() {
                    if let Some(g) = grads.get(var.as_tensor()) {
                        sq_sum += g.sqr()?.sum_all()?.to_dtype(candle_core::DType::F64)?.to_scalar::<f64>()?;
                    }
                }
                let norm = sq_sum.sqrt();
                if norm > max_norm {
                    let scale = max_norm / (norm + 1e-6);
                    for var in vars.iter() {
                        let scaled = match grads.get(var.as_tensor()) {
                            Some(g) => (g * scale)?,
                            None => continue,
                        };
                        grads.insert(var.as_tensor(), scaled);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Optimizers.
///
/// This is a thin wrapper of candle optimizers keeping the optimized variables.
pub enum Optimizer {
    /// AdamW optimizer.
    AdamW(AdamW, Vec<Var>),

    /// Adam optimizer.
    Adam(Adam, Vec<Var>),
}

impl Optimizer {
    /// Applies a backward step pass.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::AdamW(opt, _) => Ok(opt.backward_step(loss)?),
            Self::Adam(opt, _) => Ok(opt.backward_step(loss)?),
        }
    }

    /// Applies a backward step pass with clipped gradients.
    pub fn backward_step_clip(&mut self, loss: &Tensor, clip: &GradClip) -> Result<()> {
        let mut grads = loss.backward()?;
        clip.apply(&mut grads, self.vars())?;
        self.step(&grads)
    }

    /// Updates the variables with the given gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::AdamW(opt, _) => Ok(opt.step(grads)?),
            Self::Adam(opt, _) => Ok(opt.step(grads)?),
        }
    }

    /// Variables updated by the optimizer.
    pub fn vars(&self) -> &[Var] {
        match self {
            Self::AdamW(_, vars) => vars,
            Self::Adam(_, vars) => vars,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};

    fn grads_of(x: &Var, coef: f32) -> Result<GradStore> {
        let c = Tensor::from_slice(&[coef, -coef], (2,), &Device::Cpu)?;
        let loss = (x.as_tensor() * c)?.sum_all()?;
        Ok(loss.backward()?)
    }

    #[test]
    fn test_clip_by_value() -> Result<()> {
        let x = Var::zeros((2,), DType::F32, &Device::Cpu)?;
        let mut grads = grads_of(&x, 5.0)?;
        GradClip::Value(1.0).apply(&mut grads, &[x.clone()])?;
        let g: Vec<f32> = grads.get(x.as_tensor()).unwrap().to_vec1()?;
        assert_eq!(g, vec![1.0, -1.0]);
        Ok(())
    }

    #[test]
    fn test_clip_by_norm() -> Result<()> {
        let x = Var::zeros((2,), DType::F32, &Device::Cpu)?;
        let mut grads = grads_of(&x, 3.0)?;
        GradClip::Norm(1.0).apply(&mut grads, &[x.clone()])?;
        let g: Vec<f32> = grads.get(x.as_tensor()).unwrap().to_vec1()?;
        let norm = (g[0] * g[0] + g[1] * g[1]).sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert!(g[0] > 0.0 && g[1] < 0.0);

        // Small gradients are kept.
        let mut grads = grads_of(&x, 0.1)?;
        GradClip::Norm(1.0).apply(&mut grads, &[x.clone()])?;
        let g: Vec<f32> = grads.get(x.as_tensor()).unwrap().to_vec1()?;
        assert!((g[0] - 0.1).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_step_moves_only_owned_vars() -> Result<()> {
        let x = Var::zeros((2,), DType::F32, &Device::Cpu)?;
        let y = Var::zeros((2,), DType::F32, &Device::Cpu)?;
        let mut opt = OptimizerConfig::Adam { lr: 0.1 }.build(vec![x.clone()])?;
        let loss = ((x.as_tensor() - 1.0)?.sqr()?.sum_all()? + (y.as_tensor() - 1.0)?.sqr()?.sum_all()?)?;
        opt.backward_step_clip(&loss, &GradClip::default())?;

        let xs: Vec<f32> = x.as_tensor().to_vec1()?;
        let ys: Vec<f32> = y.as_tensor().to_vec1()?;
        assert!(xs.iter().all(|&v| v > 0.0));
        assert_eq!(ys, vec![0.0, 0.0]);
        Ok(())
    }
}
