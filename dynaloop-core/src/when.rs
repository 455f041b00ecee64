//! Gates deciding when periodic work runs, driven by a step counter.

/// Fires once every `every` steps.
///
/// The first call always fires, which lets callers register work done at
/// startup (e.g. an initial checkpoint save). An interval of zero disables the
/// gate.
#[derive(Debug, Clone)]
pub struct Every {
    every: u64,
    last: Option<u64>,
}

impl Every {
    /// Creates a gate firing every `every` steps.
    pub fn new(every: u64) -> Self {
        Self { every, last: None }
    }

    /// Returns `true` if the gate fires at `step`.
    pub fn check(&mut self, step: u64) -> bool {
        if self.every == 0 {
            return false;
        }
        match self.last {
            None => {
                self.last = Some(step);
                true
            }
            Some(last) if step >= last + self.every => {
                // Keep the phase aligned to multiples of the interval.
                self.last = Some(last + (step - last) / self.every * self.every);
                true
            }
            Some(_) => false,
        }
    }
}

/// Number of repeats owed so that work runs `ratio` times per step.
///
/// Fractional debt is carried over between calls, so a ratio of `0.25` yields
/// one repeat every four steps and a ratio of `3.0` yields three per step.
#[derive(Debug, Clone)]
pub struct Ratio {
    ratio: f64,
    prev: Option<f64>,
}

impl Ratio {
    /// Creates a gate with the given ratio of repeats per step.
    pub fn new(ratio: f64) -> Self {
        Self { ratio, prev: None }
    }

    /// Returns the number of repeats to run at `step`.
    pub fn check(&mut self, step: u64) -> usize {
        if self.ratio <= 0.0 {
            return 0;
        }
        let step = step as f64;
        match self.prev {
            None => {
                self.prev = Some(step);
                1
            }
            Some(prev) => {
                let repeats = ((step - prev) * self.ratio).floor().max(0.0);
                self.prev = Some(prev + repeats / self.ratio);
                repeats as usize
            }
        }
    }
}
