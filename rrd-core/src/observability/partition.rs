//! Semantic groups of observation components.
use crate::error::RrdError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A partition of observation indices into body parts.
///
/// Components of a part are hidden together. Tables of the MuJoCo robots
/// group the position and velocity coordinates of each limb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPartition {
    parts: Vec<Vec<usize>>,
}

impl BodyPartition {
    /// Creates a partition from explicit index groups.
    pub fn new(parts: Vec<Vec<usize>>) -> Self {
        Self { parts }
    }

    /// Partition of `Ant-v2` and `Ant-v3`.
    pub fn ant() -> Self {
        Self::new(vec![
            vec![0, 1, 2, 3, 4, 13, 14, 15, 16, 17, 18],
            vec![5, 6, 19, 20],
            vec![7, 8, 21, 22],
            vec![9, 10, 23, 24],
            vec![11, 12, 25, 26],
        ])
    }

    /// Partition of `HalfCheetah-v2`.
    pub fn half_cheetah() -> Self {
        Self::new(vec![
            vec![0, 1, 8, 9, 10],
            vec![2, 11],
            vec![3, 12],
            vec![4, 13],
            vec![5, 14],
            vec![6, 15],
            vec![7, 16],
        ])
    }

    /// Partition of `Humanoid-v2`.
    pub fn humanoid() -> Self {
        Self::new(vec![
            vec![0, 1, 2, 3, 4, 22, 23, 24, 25, 26, 27],
            vec![5, 6, 7, 28, 29, 30],
            vec![8, 9, 10, 31, 32, 33],
            vec![11, 34],
            vec![12, 13, 14, 35, 36, 37],
            vec![15, 38],
            vec![16, 17, 39, 40],
            vec![18, 41],
            vec![19, 20, 42, 43],
            vec![21, 44],
        ])
    }

    /// Partition of `Walker2d-v2`.
    pub fn walker() -> Self {
        Self::half_cheetah()
    }

    /// Partition of `Hopper-v2`.
    pub fn hopper() -> Self {
        Self::new(vec![
            vec![0, 1, 5, 6, 7],
            vec![2, 8],
            vec![3, 9],
            vec![4, 10],
        ])
    }

    /// Looks up the partition of a MuJoCo environment by name.
    pub fn for_env(name: &str) -> Result<Self> {
        match name {
            "Ant-v2" | "Ant-v3" => Ok(Self::ant()),
            "HalfCheetah-v2" => Ok(Self::half_cheetah()),
            "Humanoid-v2" => Ok(Self::humanoid()),
            "Hopper-v2" => Ok(Self::hopper()),
            "Walker2d-v2" => Ok(Self::walker()),
            _ => Err(RrdError::InvalidConfig(format!("no body partition for {}", name)).into()),
        }
    }

    /// Number of parts.
    pub fn n_parts(&self) -> usize {
        self.parts.len()
    }

    /// Indices of part `i`.
    pub fn part(&self, i: usize) -> &[usize] {
        &self.parts[i]
    }

    /// Fails if an index does not address a component of an `obs_dim` observation.
    pub fn validate(&self, obs_dim: usize) -> Result<()> {
        match self.parts.iter().flatten().find(|&&ix| ix >= obs_dim) {
            Some(&ix) => Err(RrdError::InvalidConfig(format!(
                "part index {} out of observation dimension {}",
                ix, obs_dim
            ))
            .into()),
            None => Ok(()),
        }
    }
}
