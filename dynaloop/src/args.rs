use crate::{RunConfig, Script};
use anyhow::Result;
use clap::Parser;
use dynaloop_core::replay_buffer::ReplayKind;
use std::path::PathBuf;

/// Train an agent on a replay buffer filled by environment workers
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Args {
    /// YAML file with the run configuration, overridden by the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long, default_value_t = false)]
    pub show_config: bool,

    /// Environment as <suite>_<task>
    #[arg(long)]
    pub task: Option<String>,

    /// Base of the log directory, suffixed with the seed
    #[arg(long)]
    pub logdir: Option<PathBuf>,

    /// train or train_offline
    #[arg(long)]
    pub script: Option<Script>,

    #[arg(long)]
    pub steps: Option<u64>,

    #[arg(long)]
    pub pretrain: Option<usize>,

    #[arg(long)]
    pub train_ratio: Option<f64>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub batch_length: Option<usize>,

    #[arg(long)]
    pub log_every: Option<u64>,

    #[arg(long)]
    pub save_every: Option<u64>,

    /// Capacity of the replay buffer in transitions
    #[arg(long)]
    pub replay_size: Option<usize>,

    /// uniform, reverb or chunks
    #[arg(long)]
    pub replay: Option<ReplayKind>,

    /// Enables rate limiting at this ratio of sampled to inserted transitions
    #[arg(long)]
    pub samples_per_insert: Option<f64>,

    #[arg(long)]
    pub tolerance: Option<f64>,

    #[arg(long)]
    pub min_size: Option<usize>,

    /// Checkpoint to start from when the run has none of its own
    #[arg(long)]
    pub from_checkpoint: Option<PathBuf>,

    #[arg(long)]
    pub log_keys_sum: Option<String>,

    #[arg(long)]
    pub log_keys_mean: Option<String>,

    #[arg(long)]
    pub log_keys_max: Option<String>,

    #[arg(long)]
    pub log_zeros: Option<bool>,

    /// Number of environment workers
    #[arg(long)]
    pub envs: Option<usize>,

    /// Restarts allowed per environment worker
    #[arg(long)]
    pub env_restart: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub tensorboard: Option<bool>,

    /// Comma separated directories of recorded episodes
    #[arg(long, value_delimiter = ',')]
    pub load_directories: Vec<PathBuf>,
}

macro_rules! set_if_some {
    ($config:ident, $args:ident, $($field:ident),*) => {
        $(
            if let Some(v) = $args.$field {
                $config.$field = v;
            }
        )*
    };
}

impl Args {
    /// Overrides `config` with the flags given.
    pub fn apply(self, mut config: RunConfig) -> RunConfig {
        let args = self;
        set_if_some!(
            config,
            args,
            task,
            logdir,
            script,
            steps,
            pretrain,
            train_ratio,
            batch_size,
            batch_length,
            log_every,
            save_every,
            replay_size,
            replay,
            tolerance,
            min_size,
            log_keys_sum,
            log_keys_mean,
            log_keys_max,
            log_zeros,
            envs,
            env_restart,
            seed,
            tensorboard
        );
        if args.samples_per_insert.is_some() {
            config.samples_per_insert = args.samples_per_insert;
        }
        if args.from_checkpoint.is_some() {
            config.from_checkpoint = args.from_checkpoint;
        }
        if !args.load_directories.is_empty() {
            config.load_directories = args.load_directories;
        }
        config
    }

    /// Loads the configuration file, if any, and applies the flags.
    pub fn resolve(self) -> Result<RunConfig> {
        let config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        Ok(self.apply(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_flags_override_file() -> Result<()> {
        let dir = TempDir::new("args")?;
        let path = dir.path().join("config.yaml");
        RunConfig {
            batch_size: 4,
            steps: 10,
            ..Default::default()
        }
        .save(&path)?;

        let args = Args::try_parse_from([
            "dynaloop",
            "--config",
            path.to_str().unwrap(),
            "--steps",
            "20",
            "--replay",
            "chunks",
            "--script",
            "train_offline",
            "--samples-per-insert",
            "2.5",
            "--load-directories",
            "a,b",
        ])?;
        let config = args.resolve()?;
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.steps, 20);
        assert_eq!(config.replay, ReplayKind::Chunks);
        assert_eq!(config.script, Script::TrainOffline);
        assert_eq!(config.samples_per_insert, Some(2.5));
        assert_eq!(
            config.load_directories,
            vec![PathBuf::from("a"), PathBuf::from("b")]
        );
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_replay() {
        assert!(Args::try_parse_from(["dynaloop", "--replay", "lifo"]).is_err());
    }
}
