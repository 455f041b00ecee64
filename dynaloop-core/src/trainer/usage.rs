use crate::record::{Record, RecordValue};
use log::trace;

/// Resource usage of the process.
#[derive(Debug, Default)]
pub struct Usage;

impl Usage {
    /// Creates a probe.
    pub fn new() -> Self {
        Self
    }

    /// Resident memory as `ram_mb`, when the platform exposes it.
    pub fn stats(&self) -> Record {
        let mut record = Record::empty();
        match resident_kb() {
            Some(kb) => record.insert("ram_mb", RecordValue::Scalar(kb as f32 / 1024.0)),
            None => trace!("Resident memory is not available"),
        }
        record
    }
}

fn resident_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|l| l.starts_with("VmRSS:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}
