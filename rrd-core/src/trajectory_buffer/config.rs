//! Configuration of [`TrajectoryBuffer`](super::TrajectoryBuffer).
use serde::{Deserialize, Serialize};

/// Configuration of [`TrajectoryBuffer`](super::TrajectoryBuffer).
///
/// ```rust
/// use rrd_core::trajectory_buffer::TrajectoryBufferConfig;
///
/// let config = TrajectoryBufferConfig::default()
///     .capacity(100_000)
///     .context(10);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrajectoryBufferConfig {
    /// Maximum number of transitions. The oldest trajectory is evicted when
    /// an insertion exceeds it.
    pub capacity: usize,

    /// Maximum number of `(obs, act)` pairs in a state prediction sequence.
    pub context: usize,
}

impl Default for TrajectoryBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            context: 20,
        }
    }
}

impl TrajectoryBufferConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the length of state prediction sequences.
    pub fn context(mut self, context: usize) -> Self {
        self.context = context;
        self
    }
}
