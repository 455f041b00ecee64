use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [ActorManager](super::ActorManager).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActorManagerConfig {
    /// Number of actors, each stepping its own environment.
    pub n_actors: usize,

    /// Capacity of the channel of messages to the trainer.
    ///
    /// Actors wait when it is full, which keeps environment stepping in pace
    /// with training.
    pub channel_capacity: usize,

    /// Environment restarts allowed per actor before it gives up.
    pub max_restarts: usize,

    /// Fields whose per-episode sum is reported.
    pub log_keys_sum: String,

    /// Fields whose per-episode mean is reported.
    pub log_keys_mean: String,

    /// Fields whose per-episode maximum is reported.
    pub log_keys_max: String,

    /// Report selected fields even if they were zero in every step so far.
    pub log_zeros: bool,
}

impl Default for ActorManagerConfig {
    fn default() -> Self {
        Self {
            n_actors: 1,
            channel_capacity: 1000,
            max_restarts: 3,
            log_keys_sum: "^$".to_string(),
            log_keys_mean: "^$".to_string(),
            log_keys_max: "^$".to_string(),
            log_zeros: false,
        }
    }
}

impl ActorManagerConfig {
    /// Creates a configuration with `n_actors` actors.
    pub fn new(n_actors: usize) -> Self {
        Self {
            n_actors,
            ..Default::default()
        }
    }

    /// Sets the number of allowed restarts.
    pub fn max_restarts(mut self, v: usize) -> Self {
        self.max_restarts = v;
        self
    }

    /// Sets the capacity of the message channel.
    pub fn channel_capacity(mut self, v: usize) -> Self {
        self.channel_capacity = v;
        self
    }

    /// Sets the patterns of per-episode statistics.
    pub fn log_keys(mut self, sum: &str, mean: &str, max: &str) -> Self {
        self.log_keys_sum = sum.to_string();
        self.log_keys_mean = mean.to_string();
        self.log_keys_max = max.to_string();
        self
    }

    /// Sets whether all-zero fields are reported.
    pub fn log_zeros(mut self, v: bool) -> Self {
        self.log_zeros = v;
        self
    }

    /// Constructs [ActorManagerConfig] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [ActorManagerConfig].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
