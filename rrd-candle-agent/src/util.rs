//! Utilities.
use crate::mlp::BIAS_INIT;
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use log::trace;
use rand::{rngs::StdRng, Rng};
use rrd_core::{error::RrdError, util::standard_normal};
pub mod actor;
pub mod critic;

/// Apply soft update on variables.
///
/// Variables are identified by their names, the name of a variable in `src` is
/// the name in `dest` with `ss_dest` replaced by `ss_src`.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track_with_replace_substring(
    dest: &VarMap,
    src: &VarMap,
    tau: f64,
    (ss_src, ss_dest): (&str, &str),
) -> Result<()> {
    trace!("dest");
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    trace!("src");
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let k_src = k_dest.replacen(ss_dest, ss_src, 1);
        let v_src = src
            .get(&k_src)
            .ok_or_else(|| anyhow!("No variable {} to track", k_src))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Overwrites all variables in `varmap` with values drawn from `rng`.
///
/// Variables are visited in the order of their names. Parameters of LSTM layers
/// are drawn from `U(-1/sqrt(h), 1/sqrt(h))` with hidden size `h`. Other weight
/// matrices are Xavier-uniform and other biases are set to 0.1.
pub fn init_seeded(varmap: &VarMap, rng: &mut StdRng) -> Result<()> {
    let data = varmap.data().lock().map_err(|e| anyhow!("{}", e))?;
    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    for name in names {
        let var = &data[name];
        let dims = var.dims().to_vec();
        let n = var.elem_count();
        let values = if name.split('.').any(|s| s == "lstm") {
            let hidden = (var.dim(0)? / 4).max(1);
            uniform(rng, n, 1.0 / (hidden as f64).sqrt())
        } else if dims.len() == 2 {
            uniform(rng, n, (6.0 / (dims[0] + dims[1]) as f64).sqrt())
        } else {
            vec![BIAS_INIT as f32; n]
        };
        trace!("init {} {:?}", name, dims);
        var.set(&Tensor::from_vec(values, dims, var.device())?)?;
    }

    Ok(())
}

fn uniform(rng: &mut StdRng, n: usize, bound: f64) -> Vec<f32> {
    (0..n).map(|_| rng.gen_range(-bound..bound) as f32).collect()
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Creates a `(n, dim)` tensor from row-major values.
pub fn rows(values: &[f32], n: usize, dim: usize, device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(values, (n, dim), device)?)
}

/// Draws a tensor of standard normal samples from `rng`.
pub fn randn(rng: &mut StdRng, dims: &[usize], device: &Device) -> Result<Tensor> {
    let n = dims.iter().product();
    Ok(Tensor::from_vec(standard_normal(rng, n), dims, device)?)
}

/// Mean of the squared errors weighted by `mask`, over all elements.
///
/// Elements with zero weight still count in the denominator.
pub fn masked_mse(pred: &Tensor, label: &Tensor, mask: &Tensor) -> Result<Tensor> {
    Ok(((pred - label)?.sqr()? * mask)?.mean_all()?)
}

/// Per-component mean of the squared errors over the rows where `mask` is 1.
///
/// Components without any weight are reported as 0.
pub fn masked_mse_per_component(pred: &Tensor, label: &Tensor, mask: &Tensor) -> Result<Vec<f32>> {
    let sq = ((pred - label)?.sqr()? * mask)?.sum(0)?;
    let n = mask.sum(0)?;
    let sq: Vec<f32> = sq.to_vec1()?;
    let n: Vec<f32> = n.to_vec1()?;
    Ok(sq
        .iter()
        .zip(n.iter())
        .map(|(s, n)| if *n > 0.0 { s / n } else { 0.0 })
        .collect())
}

/// Returns the value of a tensor with a single element.
///
/// An empty tensor is a [`RrdError::BrokenInvariant`].
pub fn scalar(t: &Tensor) -> Result<f32> {
    match t.flatten_all()?.to_vec1::<f32>()?.first() {
        Some(v) => Ok(*v),
        None => Err(RrdError::BrokenInvariant(format!("scalar of an empty tensor {:?}", t.shape())).into()),
    }
}
