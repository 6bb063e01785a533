//! Partial observability.
//!
//! [`ObservabilityFilter`] hides random [`BodyPartition`] parts of
//! observations; the hidden components are later filled with a belief of a
//! [`StateEstimator`](crate::StateEstimator) by [`blend`].
mod belief;
mod filter;
mod partition;
pub use belief::{blend, hidden_mse};
pub use filter::{Filtered, MaskState, ObservabilityFilter, ObservabilityFilterConfig};
pub use partition::BodyPartition;
