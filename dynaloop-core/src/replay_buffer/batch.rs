//! Windows and batches sampled from the replay buffer.
use crate::transition::{Transition, Value};
use serde::{Deserialize, Serialize};

/// Unique key of a window, used to update its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey(pub u64);

/// A fixed-length contiguous slice of an episode, copied out of the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Key of the window in the buffer.
    pub key: WindowKey,

    /// Transitions of the window, `batch_length` of them.
    pub transitions: Vec<Transition>,

    /// Normalized importance weight, set by prioritized sampling.
    pub weight: Option<f32>,
}

/// A batch of windows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    windows: Vec<Window>,
}

impl Batch {
    /// Creates a batch from windows.
    pub fn new(windows: Vec<Window>) -> Self {
        Self { windows }
    }

    /// Number of windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// `true` if the batch holds no windows.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Length of the windows.
    pub fn batch_length(&self) -> usize {
        self.windows.first().map_or(0, |w| w.transitions.len())
    }

    /// The windows.
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// Keys of the windows, in order.
    pub fn keys(&self) -> Vec<WindowKey> {
        self.windows.iter().map(|w| w.key).collect()
    }

    /// Importance weights if the batch was sampled by priority.
    pub fn weights(&self) -> Option<Vec<f32>> {
        self.windows.iter().map(|w| w.weight).collect()
    }

    /// Values of one field, `[window][time]`.
    pub fn field(&self, name: &str) -> Vec<Vec<Option<&Value>>> {
        self.windows
            .iter()
            .map(|w| w.transitions.iter().map(|t| t.get(name)).collect())
            .collect()
    }

    /// Rewards, `[window][time]`.
    pub fn rewards(&self) -> Vec<Vec<f32>> {
        self.windows
            .iter()
            .map(|w| w.transitions.iter().map(|t| t.reward()).collect())
            .collect()
    }
}

/// New priorities of sampled windows, returned by a training step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriorityUpdate {
    /// Keys of the windows to update.
    pub keys: Vec<WindowKey>,

    /// New priorities, one per key.
    pub priorities: Vec<f32>,
}
