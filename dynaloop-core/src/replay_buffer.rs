//! Replay buffer of episodes with uniform and prioritized window sampling.
//!
//! Workers add transitions one at a time with [`ReplayBuffer::add`]. Episodes
//! become sampleable once their last transition arrives. The trainer draws
//! [`Batch`]es of fixed-length windows either directly with
//! [`ReplayBuffer::sample`] or through a [`Dataset`](crate::Dataset).
mod base;
mod batch;
mod config;
mod episode;
mod iw_scheduler;
mod rate_limiter;
mod stats;
mod sum_tree;
pub use base::ReplayBuffer;
pub use batch::{Batch, PriorityUpdate, Window, WindowKey};
pub use config::{PriorityConfig, ReplayConfig, ReplayKind};
pub use episode::{episode_paths, load_episode, Episode};
pub use iw_scheduler::IwScheduler;
use rate_limiter::RateLimiter;
pub use stats::ReplayStats;
use sum_tree::SumTree;
