//! Agent.
use crate::{
    record::Record,
    replay_buffer::{Batch, PriorityUpdate},
};
use anyhow::Result;

/// Output of one training step.
#[derive(Debug, Clone)]
pub struct TrainOutput<C> {
    /// State carried into the next training step.
    pub carry: C,

    /// Metrics of the step, aggregated under the `train/` prefix.
    pub metrics: Record,

    /// New priorities of the sampled windows, if the agent computes them.
    pub priorities: Option<PriorityUpdate>,
}

/// A learner updated from batches of replay windows.
///
/// State that lives across training steps, e.g. recurrent latents, is passed
/// in and returned explicitly as [`Agent::Carry`] rather than kept implicitly.
pub trait Agent {
    /// State threaded from one training step into the next.
    type Carry;

    /// Creates the carried state for batches of `batch_size` windows.
    fn init_train(&self, batch_size: usize) -> Self::Carry;

    /// Performs an optimization step.
    fn train(&mut self, batch: &Batch, carry: Self::Carry) -> Result<TrainOutput<Self::Carry>>;

    /// Computes diagnostics on a batch. Called once per log interval.
    fn report(&mut self, batch: &Batch) -> Result<Record>;

    /// Serializes the trainable state.
    fn save_state(&self) -> Result<Vec<u8>>;

    /// Restores the trainable state written by [`Agent::save_state`].
    fn load_state(&mut self, state: &[u8]) -> Result<()>;
}
