//! Configuration of [`Trainer`](super::Trainer).
use crate::error::DynaloopError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Budget of the step counter.
    pub steps: u64,

    /// Training iterations before the main loop, at least one.
    pub pretrain: usize,

    /// Replayed transitions per environment step.
    pub train_ratio: f64,

    /// Windows per batch.
    pub batch_size: usize,

    /// Transitions per window.
    pub batch_length: usize,

    /// Interval of writing metrics in steps. Zero disables logging.
    pub log_every: u64,

    /// Interval of saving checkpoints in steps. Zero disables periodic saves.
    pub save_every: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            steps: 1_000_000,
            pretrain: 1,
            train_ratio: 32.0,
            batch_size: 16,
            batch_length: 64,
            log_every: 1000,
            save_every: 10000,
        }
    }
}

impl TrainerConfig {
    /// Sets the step budget.
    pub fn steps(mut self, v: u64) -> Self {
        self.steps = v;
        self
    }

    /// Sets the number of pretraining iterations.
    pub fn pretrain(mut self, v: usize) -> Self {
        self.pretrain = v;
        self
    }

    /// Sets the train ratio.
    pub fn train_ratio(mut self, v: f64) -> Self {
        self.train_ratio = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the window length.
    pub fn batch_length(mut self, v: usize) -> Self {
        self.batch_length = v;
        self
    }

    /// Sets the logging interval in steps.
    pub fn log_every(mut self, v: u64) -> Self {
        self.log_every = v;
        self
    }

    /// Sets the checkpoint interval in steps.
    pub fn save_every(mut self, v: u64) -> Self {
        self.save_every = v;
        self
    }

    /// Replayed transitions per batch.
    pub fn batch_steps(&self) -> usize {
        self.batch_size * self.batch_length
    }

    /// Training iterations per environment step.
    pub fn updates_per_step(&self) -> f64 {
        self.train_ratio / self.batch_steps() as f64
    }

    /// Rejects inconsistent settings.
    pub fn validate(&self) -> Result<(), DynaloopError> {
        let err = |msg: &str| Err(DynaloopError::Config(msg.to_string()));
        if self.pretrain == 0 {
            return err("pretrain must be at least 1");
        }
        if self.batch_size == 0 {
            return err("batch_size must be positive");
        }
        if self.batch_length == 0 {
            return err("batch_length must be positive");
        }
        if !self.train_ratio.is_finite() || self.train_ratio < 0.0 {
            return err("train_ratio must be a non-negative number");
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
