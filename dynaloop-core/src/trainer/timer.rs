use crate::record::{Record, RecordValue};
use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

/// Wall-clock time spent in named sections.
///
/// [`Timer::stats`] reports `<name>_total` (seconds), `<name>_count` and
/// `<name>_frac` (share of the time since the previous report) and restarts
/// the measurement.
#[derive(Debug)]
pub struct Timer {
    since: Instant,
    sections: BTreeMap<String, (Duration, u64)>,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Starts measuring.
    pub fn new() -> Self {
        Self {
            since: Instant::now(),
            sections: BTreeMap::new(),
        }
    }

    /// Runs `f`, accounting its duration to section `name`.
    pub fn scope<T>(&mut self, name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.add(name, start.elapsed());
        out
    }

    /// Accounts `d` to section `name`.
    pub fn add(&mut self, name: &str, d: Duration) {
        let section = self.sections.entry(name.to_string()).or_default();
        section.0 += d;
        section.1 += 1;
    }

    /// Reports and resets all sections.
    pub fn stats(&mut self) -> Record {
        let elapsed = self.since.elapsed().as_secs_f32();
        let mut record = Record::empty();
        for (name, (total, count)) in std::mem::take(&mut self.sections) {
            let total = total.as_secs_f32();
            record.insert(format!("{}_total", name), RecordValue::Scalar(total));
            record.insert(format!("{}_count", name), RecordValue::Scalar(count as f32));
            let frac = if elapsed > 0.0 { total / elapsed } else { 0.0 };
            record.insert(format!("{}_frac", name), RecordValue::Scalar(frac));
        }
        self.since = Instant::now();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_timer_stats() -> Result<()> {
        let mut timer = Timer::new();
        let x = timer.scope("train", || 1 + 1);
        assert_eq!(x, 2);
        timer.add("train", Duration::from_millis(5));
        timer.add("dataset", Duration::from_millis(1));

        let stats = timer.stats();
        assert_eq!(stats.get_scalar("train_count")?, 2.0);
        assert!(stats.get_scalar("train_total")? >= 0.005);
        assert!(stats.contains_key("dataset_frac"));
        assert!(timer.stats().is_empty());
        Ok(())
    }
}
