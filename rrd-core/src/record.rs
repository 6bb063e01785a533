//! Types and traits for recording training metrics.
//!
//! * [`Record`] - a container of key-value pairs of various data types
//! * [`Recorder`] - the interface for writing records
//! * [`SeriesRecorder`] - appends values to CSV series keyed by a [`RunKey`]
//! * [`BufferedRecorder`] - keeps records in memory
//! * [`NullRecorder`] - discards all records
//!
//! ```rust
//! use rrd_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("env_steps", RecordValue::Scalar(1000.0));
//! record.insert("eval_return", RecordValue::Scalar(-12.5));
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod run_key;
mod series_recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use run_key::RunKey;
pub use series_recorder::SeriesRecorder;
