use crate::PointMassConfig;
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rrd_core::{
    error::RrdError,
    observability::BodyPartition,
    record::{Record, RecordValue},
    Env, Step,
};

/// Masses on a line, each pushed by one action component and pulled back by a spring.
///
/// The observation is `[positions, velocities]`, so body part `i` consists of
/// the components `i` and `n + i`. The reward is
/// `1 - mean((position - goal)^2) / 10 - mean(action^2) / 100` per step.
pub struct PointMassEnv {
    config: PointMassConfig,
    rng: StdRng,
    pos: Vec<f32>,
    vel: Vec<f32>,
    t: usize,
    pending_reward: f32,
}

impl PointMassEnv {
    fn obs(&self) -> Vec<f32> {
        self.pos.iter().chain(self.vel.iter()).copied().collect()
    }
}

impl Env for PointMassEnv {
    type Config = PointMassConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if config.n_masses == 0 {
            return Err(RrdError::InvalidConfig("n_masses must be positive".to_string()).into());
        }
        Ok(Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed as u64),
            pos: vec![0.0; config.n_masses],
            vel: vec![0.0; config.n_masses],
            t: 0,
            pending_reward: 0.0,
        })
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        for i in 0..self.config.n_masses {
            self.pos[i] = self.rng.gen_range(-0.1..0.1);
            self.vel[i] = self.rng.gen_range(-0.1..0.1);
        }
        self.t = 0;
        self.pending_reward = 0.0;
        Ok(self.obs())
    }

    fn step(&mut self, act: &[f32]) -> Result<(Step, Record)> {
        let n = self.config.n_masses;
        if act.len() != n {
            return Err(RrdError::DimensionMismatch {
                context: "point mass action".to_string(),
                expected: n,
                actual: act.len(),
            }
            .into());
        }
        let c = &self.config;
        let mut cost_pos = 0.0;
        let mut cost_act = 0.0;
        for i in 0..n {
            let force = act[i].clamp(-c.max_force, c.max_force);
            let acc = force - c.stiffness * self.pos[i] - c.damping * self.vel[i];
            self.vel[i] += c.dt * acc;
            self.pos[i] += c.dt * self.vel[i];
            cost_pos += (self.pos[i] - c.goal).powi(2);
            cost_act += force.powi(2);
        }
        self.t += 1;

        let reward = 1.0 - cost_pos / (10.0 * n as f32) - cost_act / (100.0 * n as f32);
        let is_terminated = self.pos.iter().any(|p| p.abs() > c.bound);
        let is_truncated = !is_terminated && self.t >= c.max_steps;

        let reward = match c.delayed_reward {
            false => reward,
            true => {
                self.pending_reward += reward;
                match is_terminated || is_truncated {
                    true => self.pending_reward,
                    false => 0.0,
                }
            }
        };
        if is_terminated {
            trace!("Terminated at step {}", self.t);
        }

        let mut record = Record::from_scalar("cost_position", cost_pos);
        record.insert("t", RecordValue::Scalar(self.t as f32));
        Ok((Step::new(self.obs(), reward, is_terminated, is_truncated), record))
    }

    fn obs_dim(&self) -> usize {
        2 * self.config.n_masses
    }

    fn act_dim(&self) -> usize {
        self.config.n_masses
    }

    fn action_scale(&self) -> Vec<f32> {
        vec![self.config.max_force; self.config.n_masses]
    }

    fn partition(&self) -> BodyPartition {
        let n = self.config.n_masses;
        BodyPartition::new((0..n).map(|i| vec![i, n + i]).collect())
    }
}
