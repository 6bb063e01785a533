use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identifies a training run by its environment, masking scheme and hyperparameters.
///
/// Two runs with the same key write to the same series files, so results of
/// repeated seeds line up in the directory tree:
///
/// `{root}/{env}/{critic}/{state_model}/{series}/{file_name}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunKey {
    /// Name of the environment.
    pub env: String,

    /// Whether the critics are conditioned on the observation history.
    pub context_critic: bool,

    /// Name of the state model, `None` when state prediction is disabled.
    pub state_model: Option<String>,

    /// Whether hidden components are filled with a belief.
    pub state_fill: bool,

    /// Number of hidden body parts.
    pub num_hidden: usize,

    /// Random seed.
    pub seed: i64,

    /// Learning rate of the critics.
    pub critic_lr: f64,

    /// Learning rate of the actor.
    pub actor_lr: f64,

    /// Learning rate of the state predictor.
    pub state_lr: f64,

    /// Warmup for the state predictor, in transitions.
    pub start_learning_state: usize,

    /// Warmup for reward redistribution and SAC, in transitions.
    pub start_learning: usize,

    /// Hidden size of the sequence model.
    pub hidden_size: usize,

    /// Length of the observation history.
    pub context: usize,

    /// Iteration at which the value functions are reset, `-1` for never.
    pub policy_reset_step: i64,
}

impl Default for RunKey {
    fn default() -> Self {
        Self {
            env: "PointMass-v0".to_string(),
            context_critic: false,
            state_model: None,
            state_fill: true,
            num_hidden: 0,
            seed: 1,
            critic_lr: 3e-4,
            actor_lr: 3e-4,
            state_lr: 1e-3,
            start_learning_state: 10_000,
            start_learning: 1_000_000,
            hidden_size: 64,
            context: 20,
            policy_reset_step: -1,
        }
    }
}

impl RunKey {
    /// Directory segment describing the critics.
    pub fn critic_label(&self) -> String {
        match self.context_critic {
            true => format!("{}cSAC", self.context),
            false => "NoContext".to_string(),
        }
    }

    /// Directory segment describing the state model.
    pub fn state_model_label(&self) -> String {
        match (&self.state_model, self.state_fill) {
            (Some(name), _) => name.clone(),
            (None, true) => "Fill".to_string(),
            (None, false) => "NoFill".to_string(),
        }
    }

    /// File name shared by every series of the run.
    pub fn file_name(&self) -> String {
        format!(
            "{}Hidden{}QLR{}ALR{}SLR{}Start{},{}HS{}C{}RST{}.csv",
            self.num_hidden,
            self.seed,
            self.critic_lr,
            self.actor_lr,
            self.state_lr,
            self.start_learning_state,
            self.start_learning,
            self.hidden_size,
            self.context,
            self.policy_reset_step
        )
    }

    /// Path of the file holding `series` under `root`.
    pub fn series_path(&self, root: impl AsRef<Path>, series: &str) -> PathBuf {
        root.as_ref()
            .join(&self.env)
            .join(self.critic_label())
            .join(self.state_model_label())
            .join(series)
            .join(self.file_name())
    }
}
