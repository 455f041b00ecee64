use super::{Record, Recorder};
use anyhow::Result;

/// A recorder that ignores any record. This struct is used just for debugging.
#[derive(Default)]
pub struct NullRecorder {}

impl Recorder for NullRecorder {
    /// Discard the given record.
    fn write(&mut self, _step: u64, _record: &Record) -> Result<()> {
        Ok(())
    }
}
