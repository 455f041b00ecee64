use anyhow::Result;
use dynaloop_core::TrainerConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Configuration of [`AsyncTrainer`](crate::AsyncTrainer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AsyncTrainerConfig {
    /// Configuration of the training step driver.
    pub trainer: TrainerConfig,

    /// How long to wait for a message from actors before giving up.
    pub message_timeout_secs: f64,
}

impl Default for AsyncTrainerConfig {
    fn default() -> Self {
        Self {
            trainer: TrainerConfig::default(),
            message_timeout_secs: 600.0,
        }
    }
}

impl AsyncTrainerConfig {
    /// Sets the configuration of the training step driver.
    pub fn trainer(mut self, trainer: TrainerConfig) -> Self {
        self.trainer = trainer;
        self
    }

    /// Sets the message timeout.
    pub fn message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout_secs = timeout.as_secs_f64();
        self
    }

    /// The message timeout as a [`Duration`].
    pub fn message_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.message_timeout_secs.max(0.0))
    }

    /// Constructs [`AsyncTrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`AsyncTrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_async_trainer_config() -> Result<()> {
        let config = AsyncTrainerConfig::default()
            .trainer(TrainerConfig::default().steps(10).pretrain(2))
            .message_timeout(Duration::from_secs(5));
        let dir = TempDir::new("async_trainer_config")?;
        let path = dir.path().join("async_trainer.yaml");
        config.save(&path)?;
        assert_eq!(AsyncTrainerConfig::load(&path)?, config);
        Ok(())
    }
}
