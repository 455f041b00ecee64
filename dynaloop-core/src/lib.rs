#![warn(missing_docs)]
//! Core of dynaloop: an episode replay buffer and the training loop around it.
//!
//! Environment workers add transitions to a shared [`ReplayBuffer`]. The
//! [`Trainer`] pulls batches of fixed-length windows through a [`Dataset`],
//! updates an [`Agent`], feeds priorities back to the buffer, aggregates
//! [`record::Metrics`] and periodically writes them. A [`Checkpoint`] holds
//! the agent state together with the step and real-step [`Counter`]s so that
//! a run resumes exactly.
//!
//! [`ReplayBuffer`]: replay_buffer::ReplayBuffer
pub mod checkpoint;
pub mod counter;
pub mod error;
pub mod record;
pub mod replay_buffer;
pub mod transition;
pub mod when;

mod base;
pub use base::{Agent, Env, EnvStep, Policy, RandomPolicy, Spaces, TrainOutput};

mod dataset;
pub use dataset::{Dataset, IntoDataset};

mod trainer;
pub use trainer::{Timer, Trainer, TrainerConfig, TrainerState, Usage};

pub use checkpoint::Checkpoint;
pub use counter::Counter;
