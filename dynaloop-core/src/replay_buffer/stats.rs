use crate::record::{Record, RecordValue};
use serde::{Deserialize, Serialize};

/// Snapshot of the state of a replay buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Stored (closed) episodes.
    pub episodes: usize,

    /// Stored transitions.
    pub transitions: usize,

    /// Capacity in transitions.
    pub capacity: usize,

    /// Sampleable windows.
    pub windows: usize,

    /// Transitions added since creation, loaded ones included.
    pub inserts: u64,

    /// Windows sampled since creation.
    pub samples: u64,

    /// Episodes evicted to respect the capacity.
    pub evicted_episodes: u64,

    /// Transitions evicted to respect the capacity.
    pub evicted_transitions: u64,

    /// Episodes still being written by workers.
    pub open_episodes: usize,

    /// Sampling is below the lower bound of the rate limiter.
    pub lagging: bool,
}

impl ReplayStats {
    /// Fraction of the capacity in use.
    pub fn utilization(&self) -> f32 {
        if self.capacity == 0 {
            0.0
        } else {
            self.transitions as f32 / self.capacity as f32
        }
    }

    /// Converts the snapshot into a [`Record`] of scalars.
    pub fn to_record(&self) -> Record {
        let scalar = |k: &str, v: f32| (k.to_string(), RecordValue::Scalar(v));
        [
            scalar("episodes", self.episodes as f32),
            scalar("transitions", self.transitions as f32),
            scalar("capacity", self.capacity as f32),
            scalar("utilization", self.utilization()),
            scalar("windows", self.windows as f32),
            scalar("inserts", self.inserts as f32),
            scalar("samples", self.samples as f32),
            scalar("evicted_episodes", self.evicted_episodes as f32),
            scalar("evicted_transitions", self.evicted_transitions as f32),
            scalar("open_episodes", self.open_episodes as f32),
            scalar("lagging", if self.lagging { 1.0 } else { 0.0 }),
        ]
        .into_iter()
        .collect()
    }
}
