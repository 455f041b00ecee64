//! Configuration of a run.
use crate::EnvRegistry;
use anyhow::Result;
use dynaloop_async_trainer::{ActorManagerConfig, AsyncTrainerConfig, EpisodeKeys};
use dynaloop_core::{
    error::DynaloopError,
    replay_buffer::{ReplayConfig, ReplayKind},
    TrainerConfig,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Which loop to run.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    /// Environment workers fill the buffer while the agent trains.
    Train,

    /// Train on episodes recorded by an earlier run, without environments.
    TrainOffline,
}

impl FromStr for Script {
    type Err = DynaloopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Self::Train),
            "train_offline" => Ok(Self::TrainOffline),
            _ => Err(DynaloopError::Config(format!("unknown script '{}'", s))),
        }
    }
}

/// Configuration of a run, read from YAML and overridden from the command line.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct RunConfig {
    /// Environment as `<suite>_<task>`.
    pub task: String,

    /// Base of the log directory. The seed is appended, see [`RunConfig::run_dir`].
    pub logdir: PathBuf,

    /// Loop to run.
    pub script: Script,

    /// Budget of the step counter.
    pub steps: u64,

    /// Training iterations before the main loop.
    pub pretrain: usize,

    /// Replayed transitions per environment step.
    pub train_ratio: f64,

    /// Windows per batch.
    pub batch_size: usize,

    /// Transitions per window.
    pub batch_length: usize,

    /// Interval of writing metrics in steps.
    pub log_every: u64,

    /// Interval of saving checkpoints in steps.
    pub save_every: u64,

    /// Capacity of the replay buffer in transitions.
    pub replay_size: usize,

    /// Layout and selection of replay windows.
    pub replay: ReplayKind,

    /// Target ratio of sampled to inserted transitions. `None` disables rate limiting.
    pub samples_per_insert: Option<f64>,

    /// Tolerated factor around `samples_per_insert`.
    ///
    /// Sampling waits while more than `samples_per_insert * tolerance`
    /// windows per inserted transition were drawn. While the trainer waits,
    /// workers insert at most one channel of steps before they wait for the
    /// trainer in turn, so that many inserts must unlock the samples of one
    /// step. Tighter settings are rejected by [`RunConfig::validate`].
    pub tolerance: f64,

    /// Windows required before the first sample.
    pub min_size: usize,

    /// Seconds to wait for a sample before giving up.
    pub sample_timeout_secs: f64,

    /// Checkpoint to start from when the run has none of its own.
    pub from_checkpoint: Option<PathBuf>,

    /// Episode fields reported as sums.
    pub log_keys_sum: String,

    /// Episode fields reported as means.
    pub log_keys_mean: String,

    /// Episode fields reported as maxima.
    pub log_keys_max: String,

    /// Report episode fields that were always zero.
    pub log_zeros: bool,

    /// Number of environment workers.
    pub envs: usize,

    /// Restarts allowed per environment worker.
    pub env_restart: usize,

    /// Random seed.
    pub seed: u64,

    /// Also write metrics for Tensorboard.
    pub tensorboard: bool,

    /// Directories of recorded episodes for `train_offline`.
    pub load_directories: Vec<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            task: "dummy_counter".to_string(),
            logdir: PathBuf::from("logdir/run"),
            script: Script::Train,
            steps: 100_000,
            pretrain: 1,
            train_ratio: 32.0,
            batch_size: 16,
            batch_length: 64,
            log_every: 1000,
            save_every: 10000,
            replay_size: 1_000_000,
            replay: ReplayKind::Uniform,
            samples_per_insert: None,
            tolerance: 10.0,
            min_size: 1,
            sample_timeout_secs: 600.0,
            from_checkpoint: None,
            log_keys_sum: "^$".to_string(),
            log_keys_mean: "^$".to_string(),
            log_keys_max: "^$".to_string(),
            log_zeros: false,
            envs: 1,
            env_restart: 3,
            seed: 0,
            tensorboard: false,
            load_directories: vec![],
        }
    }
}

impl RunConfig {
    /// Directory of this run, `<logdir>_<seed>`.
    pub fn run_dir(&self) -> PathBuf {
        let mut dir = self.logdir.clone().into_os_string();
        dir.push(format!("_{}", self.seed));
        PathBuf::from(dir)
    }

    /// Configuration of the training step driver.
    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::default()
            .steps(self.steps)
            .pretrain(self.pretrain)
            .train_ratio(self.train_ratio)
            .batch_size(self.batch_size)
            .batch_length(self.batch_length)
            .log_every(self.log_every)
            .save_every(self.save_every)
    }

    /// Configuration of the replay buffer, persisting episodes to `directory`.
    pub fn replay_config(&self, directory: Option<PathBuf>) -> ReplayConfig {
        ReplayConfig::default()
            .capacity(self.replay_size)
            .batch_length(self.batch_length)
            .kind(self.replay)
            .min_size(self.min_size)
            .samples_per_insert(self.samples_per_insert)
            .tolerance(self.tolerance)
            .sample_timeout(std::time::Duration::from_secs_f64(
                self.sample_timeout_secs.max(0.0),
            ))
            .seed(self.seed)
            .directory(directory)
    }

    /// Configuration of the environment workers.
    pub fn actor_manager_config(&self) -> ActorManagerConfig {
        ActorManagerConfig::new(self.envs)
            .max_restarts(self.env_restart)
            .log_keys(&self.log_keys_sum, &self.log_keys_mean, &self.log_keys_max)
            .log_zeros(self.log_zeros)
    }

    /// Configuration of the asynchronous training loop.
    pub fn async_trainer_config(&self) -> AsyncTrainerConfig {
        AsyncTrainerConfig::default().trainer(self.trainer_config())
    }

    /// Rejects the configuration before anything is allocated.
    pub fn validate(&self, registry: &EnvRegistry) -> Result<()> {
        let err = |msg: String| -> Result<()> { Err(DynaloopError::Config(msg).into()) };
        self.trainer_config().validate()?;
        self.replay_config(None).validate()?;
        if !(self.tolerance >= 1.0) {
            return err("tolerance must be at least 1".to_string());
        }
        if self.envs == 0 {
            return err("envs must be positive".to_string());
        }
        if let Some(spi) = self.samples_per_insert {
            let channel = self.actor_manager_config().channel_capacity as f64;
            let unlocked = spi * self.tolerance * channel;
            let needed = self.batch_size as f64 * self.trainer_config().updates_per_step().ceil();
            if unlocked < needed {
                return err(format!(
                    "samples_per_insert * tolerance = {} lets {} inserts unlock {} samples, \
                     but a step needs {}",
                    spi * self.tolerance,
                    channel,
                    unlocked,
                    needed
                ));
            }
        }
        if let Err(e) = EpisodeKeys::new(
            &self.log_keys_sum,
            &self.log_keys_mean,
            &self.log_keys_max,
            self.log_zeros,
        ) {
            return err(format!("log keys: {}", e));
        }
        if self.script == Script::Train {
            registry.check(&self.task)?;
        }
        Ok(())
    }

    /// Constructs [`RunConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RunConfig`].
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
    fn test_partial_yaml() -> Result<()> {
        let config: RunConfig = serde_yaml::from_str(
            "task: dummy_counter\nscript: train_offline\nreplay: chunks\nbatch_size: 4\n",
        )?;
        assert_eq!(config.script, Script::TrainOffline);
        assert_eq!(config.replay, ReplayKind::Chunks);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.batch_length, 64);
        Ok(())
    }

    #[test]
    fn test_serde_run_config() -> Result<()> {
        let config = RunConfig {
            samples_per_insert: Some(0.5),
            load_directories: vec![PathBuf::from("a"), PathBuf::from("b")],
            ..Default::default()
        };
        let dir = TempDir::new("run_config")?;
        let path = dir.path().join("config.yaml");
        config.save(&path)?;
        assert_eq!(RunConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_validate() {
        let registry = EnvRegistry::builtin();
        let ok = RunConfig::default();
        assert!(ok.validate(&registry).is_ok());
        let ok = RunConfig {
            samples_per_insert: Some(0.5),
            ..Default::default()
        };
        assert!(ok.validate(&registry).is_ok());

        let invalid = [
            RunConfig {
                pretrain: 0,
                ..Default::default()
            },
            RunConfig {
                batch_length: 0,
                ..Default::default()
            },
            RunConfig {
                tolerance: 0.5,
                ..Default::default()
            },
            RunConfig {
                replay: ReplayKind::Reverb,
                samples_per_insert: Some(1.0),
                ..Default::default()
            },
            // 1000 inserts unlock 1 sample, a step draws 16.
            RunConfig {
                samples_per_insert: Some(0.001),
                tolerance: 1.0,
                ..Default::default()
            },
            RunConfig {
                task: "atari_pong".to_string(),
                ..Default::default()
            },
            RunConfig {
                log_keys_sum: "(".to_string(),
                ..Default::default()
            },
        ];
        for config in invalid.iter() {
            let err = config.validate(&registry).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<DynaloopError>(),
                Some(DynaloopError::Config(_))
            ));
        }
    }

    #[test]
    fn test_run_dir() {
        let config = RunConfig {
            logdir: PathBuf::from("/tmp/logs/counter"),
            seed: 3,
            ..Default::default()
        };
        assert_eq!(config.run_dir(), PathBuf::from("/tmp/logs/counter_3"));
    }
}
