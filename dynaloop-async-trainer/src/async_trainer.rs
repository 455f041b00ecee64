//! Asynchronous trainer driven by the steps of [`Actor`](crate::Actor)s.
mod base;
mod config;
mod stat;
pub use base::AsyncTrainer;
pub use config::AsyncTrainerConfig;
pub use stat::AsyncTrainStat;
