//! Environment.
use crate::{
    record::Record,
    transition::{Fields, Space},
};
use anyhow::Result;
use std::collections::BTreeMap;

/// Field name to space table of observations or actions.
pub type Spaces = BTreeMap<String, Space>;

/// Result of an environment step.
#[derive(Debug, Clone, Default)]
pub struct EnvStep {
    /// Observation after the step.
    pub obs: Fields,

    /// Reward of the step.
    pub reward: f32,

    /// The episode ended, by termination or truncation.
    pub is_last: bool,

    /// The episode ended in a terminal state.
    pub is_terminal: bool,

    /// The step was auxiliary (e.g. reading) rather than real interaction.
    pub is_read_step: bool,

    /// Information not stored in the replay buffer.
    pub info: Record,
}

/// Represents an environment, typically an MDP.
///
/// Simulators are wrapped behind this trait. Failures are reported as errors
/// so that the caller can restart the instance.
pub trait Env {
    /// Spaces of the observation fields.
    fn obs_space(&self) -> Spaces;

    /// Spaces of the action fields.
    fn act_space(&self) -> Spaces;

    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<Fields>;

    /// Performs an environment step.
    fn step(&mut self, act: &Fields) -> Result<EnvStep>;
}
