//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum RrdError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// The fields of a trajectory have inconsistent lengths.
    #[error("Malformed trajectory: {0}")]
    MalformedTrajectory(String),

    /// A vector does not have the dimension the component was built for.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Where the mismatch was detected.
        context: String,
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Sampling was requested from a buffer without transitions.
    #[error("Cannot sample from an empty buffer")]
    EmptyBuffer,

    /// Index resolution produced a negative local offset.
    #[error("Negative local offset while resolving global index {index} (trajectory {trajectory})")]
    NegativeOffset {
        /// The global transition index.
        index: usize,
        /// The trajectory the index was mapped to.
        trajectory: usize,
    },

    /// An index is out of the valid range.
    #[error("Index {index} out of range 0..{len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Length of the indexed collection.
        len: usize,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal bookkeeping of a component is inconsistent.
    #[error("Broken invariant: {0}")]
    BrokenInvariant(String),
}
