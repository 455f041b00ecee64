use super::{Record, Recorder};
use anyhow::Result;
use std::sync::{Arc, Mutex};

/// Buffered recorder.
///
/// Keeps every written record in memory. Clones share the same buffer, so a
/// test can hand one clone to a [`Logger`](super::Logger) and inspect the
/// other afterwards.
#[derive(Default, Clone)]
pub struct BufferedRecorder {
    buf: Arc<Mutex<Vec<(u64, Record)>>>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records written so far.
    pub fn records(&self) -> Vec<(u64, Record)> {
        self.buf.lock().unwrap().clone()
    }

    /// Number of writes.
    pub fn len(&self) -> usize {
        self.buf.lock().unwrap().len()
    }

    /// `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, step: u64, record: &Record) -> Result<()> {
        self.buf.lock().unwrap().push((step, record.clone()));
        Ok(())
    }
}
