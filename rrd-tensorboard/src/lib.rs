//! [`Recorder`] writing training reports to TensorBoard event files.
use log::warn;
use rrd_core::record::{Record, RecordValue, Recorder};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    ignore_unsupported_value: bool,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`. Values are indexed by the number of
    /// environment steps.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "env_steps".to_string(),
            ignore_unsupported_value: true,
        }
    }

    /// Construct a [`TensorboardRecorder`] warning on unsupported record values.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            ignore_unsupported_value: false,
            ..Self::new(logdir)
        }
    }

    /// Sets the key of the value used as the step of the summaries.
    pub fn step_key(mut self, key: impl Into<String>) -> Self {
        self.step_key = key.into();
        self
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// Scalars are written as they are and each component of an
    /// [`RecordValue::Array1`] is written as the scalar `{key}/{index}`.
    /// Records without the step key are skipped.
    fn write(&mut self, record: Record) {
        let step = match record.get_scalar(&self.step_key) {
            Ok(v) => v as usize,
            Err(e) => {
                warn!("Skipped a record without step: {}", e);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                RecordValue::Array1(vs) => {
                    for (i, v) in vs.iter().enumerate() {
                        self.writer.add_scalar(&format!("{}/{}", k, i), *v, step);
                    }
                }
                RecordValue::DateTime(_) => {} // discard value
                _ => {
                    if !self.ignore_unsupported_value {
                        warn!("Unsupported value: {:?}", (k, v));
                    }
                }
            };
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_creates_event_file() -> std::io::Result<()> {
        let dir = TempDir::new("tensorboard")?;
        let mut recorder = TensorboardRecorder::new(dir.path());
        let mut record = Record::from_scalar("env_steps", 100.0);
        record.insert("eval_return", RecordValue::Scalar(1.5));
        record.insert("state_min", RecordValue::Array1(vec![-1.0, -2.0]));
        recorder.write(record);
        recorder.write(Record::from_scalar("eval_return", 2.0));
        recorder.flush();

        let n_files = std::fs::read_dir(dir.path())?.count();
        assert!(n_files > 0);
        Ok(())
    }
}
