//! Interfaces between the training core and its collaborators.
mod agent;
mod env;
mod policy;
pub use agent::{Agent, TrainOutput};
pub use env::{Env, EnvStep, Spaces};
pub use policy::{Policy, RandomPolicy};
