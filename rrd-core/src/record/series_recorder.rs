use super::{Record, RecordValue, Recorder, RunKey};
use log::{info, warn};
use std::{
    fs::{create_dir_all, OpenOptions},
    path::PathBuf,
};

/// Appends scalar and array values of records to CSV series files.
///
/// Each key of a written record is a series. A row consists of the value of
/// `step_key` in the record followed by the value(s) of the series. Files are
/// located with [`RunKey::series_path`]. Failing to write a series is logged
/// and does not interrupt training.
pub struct SeriesRecorder {
    root: PathBuf,
    run_key: RunKey,
    step_key: String,
    n_writes: usize,
}

impl SeriesRecorder {
    /// Creates a recorder writing series of the run `run_key` under `root`.
    pub fn new(root: impl Into<PathBuf>, run_key: RunKey) -> Self {
        let root = root.into();
        info!(
            "Series of the run are written under {:?}",
            run_key.series_path(&root, "*")
        );
        Self {
            root,
            run_key,
            step_key: "env_steps".to_string(),
            n_writes: 0,
        }
    }

    /// Sets the key of the record used as the first column.
    pub fn step_key(mut self, step_key: impl Into<String>) -> Self {
        self.step_key = step_key.into();
        self
    }

    fn append(&self, series: &str, row: Vec<String>) -> anyhow::Result<()> {
        let path = self.run_key.series_path(&self.root, series);
        if let Some(dir) = path.parent() {
            create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        wtr.write_record(&row)?;
        wtr.flush()?;
        Ok(())
    }
}

impl Recorder for SeriesRecorder {
    fn write(&mut self, record: Record) {
        let step = match record.get_scalar(&self.step_key) {
            Ok(v) => v as usize,
            Err(_) => self.n_writes,
        };
        self.n_writes += 1;

        for (k, v) in record.iter() {
            if k == &self.step_key {
                continue;
            }
            let values = match v {
                RecordValue::Scalar(v) => vec![*v],
                RecordValue::Array1(v) => v.clone(),
                _ => continue,
            };
            let row = std::iter::once(step.to_string())
                .chain(values.iter().map(|v| v.to_string()))
                .collect();
            if let Err(e) = self.append(k, row) {
                warn!("Failed to append to series {}: {}", k, e);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn test_append_rows() -> Result<()> {
        let tmp = TempDir::new("series_recorder")?;
        let key = RunKey::default();
        let mut recorder = SeriesRecorder::new(tmp.path(), key.clone());

        for (step, ret) in [(100.0, -1.5), (200.0, 2.0)] {
            let mut record = Record::from_scalar("env_steps", step);
            record.insert("eval_return", RecordValue::Scalar(ret));
            record.insert("state_min", RecordValue::Array1(vec![0.0, -1.0]));
            recorder.write(record);
        }

        let returns = fs::read_to_string(key.series_path(tmp.path(), "eval_return"))?;
        assert_eq!(returns, "100,-1.5\n200,2\n");
        let mins = fs::read_to_string(key.series_path(tmp.path(), "state_min"))?;
        assert_eq!(mins.lines().next(), Some("100,0,-1"));
        assert!(!key.series_path(tmp.path(), "env_steps").exists());
        Ok(())
    }

    #[test]
    fn test_io_failure_is_not_fatal() -> Result<()> {
        let tmp = TempDir::new("series_recorder")?;
        // A file where a directory is expected makes every append fail.
        let blocker = tmp.path().join("blocked");
        fs::write(&blocker, "")?;
        let mut recorder = SeriesRecorder::new(&blocker, RunKey::default());
        recorder.write(Record::from_scalar("eval_return", 1.0));
        Ok(())
    }
}
