use super::{Record, RecordValue, Recorder};
use anyhow::Result;
use log::trace;
use std::time::Instant;

/// Collects prefixed values and writes them to all recorders at once.
///
/// Values added between two writes are merged, later values overwriting
/// earlier ones with the same key.
pub struct Logger {
    recorders: Vec<Box<dyn Recorder + Send>>,
    pending: Record,
    last_write: Option<(u64, Instant)>,
}

impl Logger {
    /// Creates a logger writing to `recorders`.
    pub fn new(recorders: Vec<Box<dyn Recorder + Send>>) -> Self {
        Self {
            recorders,
            pending: Record::empty(),
            last_write: None,
        }
    }

    /// Adds all values of `record` under `prefix/`.
    pub fn add(&mut self, record: Record, prefix: &str) {
        self.pending.merge_inplace(record.with_prefix(prefix));
    }

    /// Adds a scalar.
    pub fn scalar(&mut self, key: impl Into<String>, value: f32) {
        self.pending.insert(key, RecordValue::Scalar(value));
    }

    /// Values added since the last write.
    pub fn pending(&self) -> &Record {
        &self.pending
    }

    /// Writes pending values at `step` to every recorder.
    ///
    /// With `fps`, adds the number of steps per second since the previous
    /// write. The first write only starts the clock.
    pub fn write(&mut self, step: u64, fps: bool) -> Result<()> {
        let now = Instant::now();
        if fps {
            if let Some((last_step, last_time)) = self.last_write {
                let secs = now.duration_since(last_time).as_secs_f32();
                if secs > 0.0 && step >= last_step {
                    self.scalar("fps", (step - last_step) as f32 / secs);
                }
            }
            self.last_write = Some((step, now));
        }
        if self.pending.is_empty() {
            return Ok(());
        }
        let record = std::mem::take(&mut self.pending);
        trace!("Write {} values at step {}", record.len(), step);
        for recorder in self.recorders.iter_mut() {
            recorder.write(step, &record)?;
        }
        Ok(())
    }

    /// Flushes all recorders.
    pub fn flush(&mut self) -> Result<()> {
        for recorder in self.recorders.iter_mut() {
            recorder.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BufferedRecorder;

    #[test]
    fn test_write_merges_and_clears() -> Result<()> {
        let buf = BufferedRecorder::new();
        let mut logger = Logger::new(vec![Box::new(buf.clone())]);
        logger.add(Record::from_scalar("score", 1.0), "episode");
        logger.add(Record::from_scalar("score", 2.0), "episode");
        logger.scalar("real_step", 5.0);
        logger.write(10, true)?;
        logger.write(11, false)?;

        let records = buf.records();
        assert_eq!(records.len(), 1);
        let (step, record) = &records[0];
        assert_eq!(*step, 10);
        assert_eq!(record.get_scalar("episode/score")?, 2.0);
        assert_eq!(record.get_scalar("real_step")?, 5.0);
        assert!(!record.contains_key("fps"));
        Ok(())
    }
}
