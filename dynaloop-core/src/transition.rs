//! Transitions and the schema they are validated against.
//!
//! A [`Transition`] is one step's record of observation, action, reward and
//! episode flags. Every transition stored in a replay buffer is checked
//! against a [`Schema`] so that all transitions of an episode share the same
//! field set, dtypes and shapes.
mod schema;
mod value;
pub use schema::{DType, Schema, Space};
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the reward field.
pub const REWARD: &str = "reward";
/// Name of the flag marking the first transition of an episode.
pub const IS_FIRST: &str = "is_first";
/// Name of the flag marking the last transition of an episode.
pub const IS_LAST: &str = "is_last";
/// Name of the flag marking a terminal state.
pub const IS_TERMINAL: &str = "is_terminal";
/// Name of the flag marking a read-only (auxiliary) step.
pub const IS_READ_STEP: &str = "is_read_step";

/// A mapping from field name to value.
pub type Fields = BTreeMap<String, Value>;

/// One step of interaction, a mapping from field name to [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Transition(Fields);

impl Transition {
    /// Creates a transition holding only the reward and episode flags.
    pub fn new(reward: f32, is_first: bool, is_last: bool, is_terminal: bool) -> Self {
        let mut fields = Fields::new();
        fields.insert(REWARD.to_string(), Value::Float(reward));
        fields.insert(IS_FIRST.to_string(), Value::Bool(is_first));
        fields.insert(IS_LAST.to_string(), Value::Bool(is_last));
        fields.insert(IS_TERMINAL.to_string(), Value::Bool(is_terminal));
        Self(fields)
    }

    /// Inserts or replaces a field.
    pub fn insert(&mut self, k: impl Into<String>, v: Value) {
        self.0.insert(k.into(), v);
    }

    /// Builder-style [`Transition::insert`].
    pub fn with(mut self, k: impl Into<String>, v: Value) -> Self {
        self.insert(k, v);
        self
    }

    /// Extends the transition with all fields of `fields`.
    pub fn extend(&mut self, fields: Fields) {
        self.0.extend(fields);
    }

    /// Gets a field.
    pub fn get(&self, k: &str) -> Option<&Value> {
        self.0.get(k)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Iterates over fields in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the transition has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn flag(&self, k: &str) -> bool {
        matches!(self.0.get(k), Some(Value::Bool(true)))
    }

    /// Reward of the step, `0.0` if missing.
    pub fn reward(&self) -> f32 {
        match self.0.get(REWARD) {
            Some(v) => v.as_f32().unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// First transition of an episode.
    pub fn is_first(&self) -> bool {
        self.flag(IS_FIRST)
    }

    /// Last transition of an episode.
    pub fn is_last(&self) -> bool {
        self.flag(IS_LAST)
    }

    /// The episode ended in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.flag(IS_TERMINAL)
    }

    /// Read-only step, not counted as real environment interaction.
    pub fn is_read_step(&self) -> bool {
        self.flag(IS_READ_STEP)
    }
}

impl From<Fields> for Transition {
    fn from(fields: Fields) -> Self {
        Self(fields)
    }
}
