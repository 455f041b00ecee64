//! Environment-stepping workers.
mod base;
mod episode_stats;
mod stat;
pub use base::{Actor, EnvFactory, PolicyFactory};
pub use episode_stats::{EpisodeKeys, EpisodeStats};
pub use stat::{actor_stats_fmt, ActorStat};
