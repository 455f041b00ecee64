//! Bounds the ratio of sampled windows to inserted transitions.

/// Rate limiter keeping `samples / inserts` below `samples_per_insert * tolerance`.
///
/// The lower bound `samples_per_insert / tolerance` cannot be enforced without
/// blocking producers, which never block. It is reported so that a starving
/// trainer shows up in the statistics.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    samples_per_insert: f64,
    tolerance: f64,
}

impl RateLimiter {
    pub fn new(samples_per_insert: f64, tolerance: f64) -> Self {
        Self {
            samples_per_insert,
            tolerance,
        }
    }

    /// `true` if `n` more samples keep the ratio within the upper bound.
    pub fn can_sample(&self, inserts: u64, samples: u64, n: usize) -> bool {
        (samples + n as u64) as f64 <= self.samples_per_insert * self.tolerance * inserts as f64
    }

    /// `true` if sampling lags behind the lower bound.
    pub fn is_lagging(&self, inserts: u64, samples: u64) -> bool {
        (samples as f64) < self.samples_per_insert / self.tolerance * inserts as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let limiter = RateLimiter::new(0.5, 2.0);
        assert!(!limiter.can_sample(0, 0, 1));
        assert!(limiter.can_sample(10, 0, 10));
        assert!(!limiter.can_sample(10, 5, 6));
        assert!(limiter.is_lagging(10, 2));
        assert!(!limiter.is_lagging(10, 3));
    }
}
