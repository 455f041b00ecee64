//! Monotonic step counters.
//!
//! Counters are plain owned objects. Components that need one take it by
//! reference; when environment workers and the trainer share a counter it is
//! wrapped in an [`Arc`](std::sync::Arc) by the caller.
use crate::transition::Transition;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Creates a counter starting at `value`.
    pub fn new(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    /// Adds one and returns the new value.
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current value.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Restores the value read from a checkpoint.
    ///
    /// Only meant for startup, before any other component observed the counter.
    pub(crate) fn restore(&self, value: u64) {
        self.value.store(value, Ordering::SeqCst);
    }
}

/// Increments `real_step` unless the transition is a read-only step.
///
/// Returns `true` if the counter was incremented.
pub fn count_real_step(tran: &Transition, real_step: &Counter) -> bool {
    if tran.is_read_step() {
        false
    } else {
        real_step.increment();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::Value;

    fn tran(is_read_step: Option<bool>) -> Transition {
        let mut tran = Transition::new(0.0, false, false, false);
        if let Some(flag) = is_read_step {
            tran.insert("is_read_step", Value::Bool(flag));
        }
        tran
    }

    #[test]
    fn test_counter_monotonic() {
        let c = Counter::default();
        assert_eq!(c.value(), 0);
        assert_eq!(c.increment(), 1);
        assert_eq!(c.increment(), 2);
        assert_eq!(c.value(), 2);
    }

    #[test]
    fn test_real_step_counts_only_unflagged() {
        let real_step = Counter::default();
        let script = [
            Some(false),
            Some(true),
            None,
            Some(true),
            Some(true),
            Some(false),
            None,
        ];
        for flag in script.iter() {
            count_real_step(&tran(*flag), &real_step);
        }
        let expected = script.iter().filter(|f| **f != Some(true)).count();
        assert_eq!(real_step.value(), expected as u64);
    }
}
