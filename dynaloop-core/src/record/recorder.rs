use super::Record;
use anyhow::Result;

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Writes a record observed at `step`.
    fn write(&mut self, step: u64, record: &Record) -> Result<()>;

    /// Flushes buffered output, if any.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
