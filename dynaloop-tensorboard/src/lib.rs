//! Tensorboard sink for dynaloop metrics.
use anyhow::Result;
use dynaloop_core::record::{Record, RecordValue, Recorder};
use log::trace;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    ignore_unsupported_value: bool,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            ignore_unsupported_value: true,
        }
    }

    /// Construct a [`TensorboardRecorder`] rejecting values other than scalars.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            ignore_unsupported_value: false,
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// Only [RecordValue::Scalar] is supported. Other variants are skipped, or
    /// rejected if the recorder was built with
    /// [`TensorboardRecorder::new_with_check_unsupported_value`].
    fn write(&mut self, step: u64, record: &Record) -> Result<()> {
        for (k, v) in record.iter() {
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step as usize),
                _ => {
                    if !self.ignore_unsupported_value {
                        anyhow::bail!("Unsupported value: {:?}", (k, v));
                    }
                    trace!("Skipped non-scalar value {}", k);
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_scalars() -> Result<()> {
        let dir = TempDir::new("tensorboard")?;
        let mut recorder = TensorboardRecorder::new_with_check_unsupported_value(dir.path());
        recorder.write(10, &Record::from_scalar("train/loss", 0.5))?;
        recorder.flush()?;
        assert!(std::fs::read_dir(dir.path())?.next().is_some());

        let record = Record::from_slice(&[("note", RecordValue::String("x".to_string()))]);
        assert!(recorder.write(11, &record).is_err());
        Ok(())
    }
}
