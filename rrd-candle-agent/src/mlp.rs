//! Multilayer perceptron.
mod base;
mod config;
mod mlp2;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{init::Init, Linear, Module, VarBuilder};
pub use config::MlpConfig;
pub use mlp2::Mlp2;

/// Initial value of biases.
pub(crate) const BIAS_INIT: f64 = 0.1;

/// Linear layer with Xavier-uniform weights and constant biases.
pub fn linear_xavier(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let bound = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let ws = vb.get_with_hints(
        (out_dim, in_dim),
        "weight",
        Init::Uniform {
            lo: -bound,
            up: bound,
        },
    )?;
    let bs = vb.get_with_hints(out_dim, "bias", Init::Const(BIAS_INIT))?;
    Ok(Linear::new(ws, Some(bs)))
}

/// Hidden layers of [`MlpConfig`], `in_dim -> units[0] -> ... -> units[n - 1]`.
fn create_hidden_layers(vb: &VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend(config.units.iter().copied());
    dims.windows(2)
        .enumerate()
        .map(|(i, w)| linear_xavier(w[0], w[1], vb.pp(format!("ln{}", i))))
        .collect()
}

fn mlp_forward(xs: Tensor, layers: &[Linear]) -> Result<Tensor> {
    let mut xs = xs;
    for layer in layers.iter() {
        xs = layer.forward(&xs)?.relu()?;
    }
    Ok(xs)
}
