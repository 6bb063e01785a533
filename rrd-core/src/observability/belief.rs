//! Blending of observations with state beliefs.

/// Returns `known * obs + (1 - known) * belief`, element-wise.
pub fn blend(known: &[f32], obs: &[f32], belief: &[f32]) -> Vec<f32> {
    known
        .iter()
        .zip(obs.iter().zip(belief.iter()))
        .map(|(k, (o, b))| k * o + (1.0 - k) * b)
        .collect()
}

/// Mean squared error between `belief` and `truth` over hidden components.
///
/// Returns `None` when every component is known.
pub fn hidden_mse(known: &[f32], belief: &[f32], truth: &[f32]) -> Option<f32> {
    let (sum, n) = known
        .iter()
        .zip(belief.iter().zip(truth.iter()))
        .filter(|(k, _)| **k == 0.0)
        .fold((0.0, 0usize), |(sum, n), (_, (b, t))| {
            (sum + (b - t).powi(2), n + 1)
        });
    match n {
        0 => None,
        _ => Some(sum / n as f32),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blend() {
        let known = [1.0, 0.0, 1.0];
        let obs = [1.0, 0.0, 3.0];
        let belief = [10.0, 20.0, 30.0];
        assert_eq!(blend(&known, &obs, &belief), vec![1.0, 20.0, 3.0]);
    }

    #[test]
    fn test_hidden_mse() {
        assert_eq!(hidden_mse(&[1.0, 1.0], &[0.0, 0.0], &[5.0, 5.0]), None);
        assert_eq!(
            hidden_mse(&[0.0, 1.0, 0.0], &[1.0, 100.0, 3.0], &[2.0, 0.0, 0.0]),
            Some(5.0)
        );
    }
}
