//! A manager of [`Actor`](crate::Actor)s.
mod base;
mod config;
pub use base::ActorManager;
pub use config::ActorManagerConfig;
