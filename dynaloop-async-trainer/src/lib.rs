//! Asynchronous training with environment workers.
//!
//! [`Actor`]s step their own environments in separate threads and add every
//! transition to a shared [`ReplayBuffer`](dynaloop_core::replay_buffer::ReplayBuffer).
//! The [`AsyncTrainer`] counts their steps and trains in step with them.
//!
//! # Messages
//! * From [`Actor`] to [`AsyncTrainer`], see [`ActorMessage`]
//!   - `Step` after each transition added to the buffer
//!   - `Episode` with the summary and statistics of a finished episode
//!   - `Restart` and `Failed` when an environment breaks
mod actor;
mod actor_manager;
mod async_trainer;
mod messages;
pub use actor::{actor_stats_fmt, Actor, ActorStat, EnvFactory, EpisodeKeys, EpisodeStats, PolicyFactory};
pub use actor_manager::{ActorManager, ActorManagerConfig};
pub use async_trainer::{AsyncTrainStat, AsyncTrainer, AsyncTrainerConfig};
pub use messages::ActorMessage;
