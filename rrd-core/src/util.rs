//! Utilities shared by the components of the library.
use rand::{rngs::StdRng, seq::index, Rng};

/// Draws `k` indices from `0..n`.
///
/// Indices are drawn without replacement when `k <= n` and with replacement
/// otherwise. `n` must be positive.
pub fn sample_indices(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    if k > n {
        (0..k).map(|_| rng.gen_range(0..n)).collect()
    } else {
        index::sample(rng, n, k).into_vec()
    }
}

/// Draws `n` samples from the standard normal distribution (Box-Muller).
pub fn standard_normal(rng: &mut StdRng, n: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(n + 1);
    while out.len() < n {
        // gen::<f64>() is in [0, 1); keep u1 away from zero for the log.
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = rng.gen();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        out.push((r * theta.cos()) as f32);
        out.push((r * theta.sin()) as f32);
    }
    out.truncate(n);
    out
}

/// Returns the element-wise difference `a - b`.
pub fn sub(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b.iter()).map(|(a, b)| a - b).collect()
}
