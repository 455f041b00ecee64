//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use crate::{error::DynaloopError, transition::Schema};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    time::Duration,
};

/// How windows are laid out and selected.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ReplayKind {
    /// Every position of an episode starts a window, sampled uniformly.
    Uniform,

    /// Every position starts a window, sampled in proportion to its priority.
    #[serde(alias = "prioritized")]
    Reverb,

    /// Episodes are cut into non-overlapping windows, sampled uniformly.
    Chunks,
}

impl ReplayKind {
    /// Distance between the starts of two consecutive windows of an episode.
    pub fn stride(&self, batch_length: usize) -> usize {
        match self {
            Self::Uniform | Self::Reverb => 1,
            Self::Chunks => batch_length,
        }
    }
}

impl std::str::FromStr for ReplayKind {
    type Err = DynaloopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "reverb" | "prioritized" => Ok(Self::Reverb),
            "chunks" => Ok(Self::Chunks),
            _ => Err(DynaloopError::Config(format!("unknown replay '{}'", s))),
        }
    }
}

/// Configuration of prioritized sampling.
///
/// Sampling probability of window `i` is `p_i^alpha / sum_j p_j^alpha`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PriorityConfig {
    /// Exponent applied to priorities. `1.0` samples in proportion to priority.
    pub alpha: f32,

    /// Initial value of the importance sampling exponent.
    pub beta_0: f32,

    /// Final value of the importance sampling exponent.
    pub beta_final: f32,

    /// Number of priority updates after which `beta` reaches `beta_final`.
    pub n_opts_final: usize,

    /// Priority of fresh windows. `None` uses the largest priority currently stored.
    pub initial_priority: Option<f32>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta_0: 0.4,
            beta_final: 1.0,
            n_opts_final: 500_000,
            initial_priority: Some(1.0),
        }
    }
}

impl PriorityConfig {
    /// Sets the prioritization exponent `alpha`.
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the initial importance sampling exponent.
    pub fn beta_0(mut self, beta_0: f32) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets the final importance sampling exponent.
    pub fn beta_final(mut self, beta_final: f32) -> Self {
        self.beta_final = beta_final;
        self
    }

    /// Sets the number of updates until `beta_final` is reached.
    pub fn n_opts_final(mut self, n_opts_final: usize) -> Self {
        self.n_opts_final = n_opts_final;
        self
    }

    /// Sets the priority of fresh windows.
    pub fn initial_priority(mut self, p: Option<f32>) -> Self {
        self.initial_priority = p;
        self
    }
}

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayConfig {
    /// Maximum number of stored transitions.
    pub capacity: usize,

    /// Length of sampled windows.
    pub batch_length: usize,

    /// Window layout and selection.
    pub kind: ReplayKind,

    /// Number of windows that must be stored before sampling starts.
    pub min_size: usize,

    /// Target ratio of sampled windows to inserted transitions.
    pub samples_per_insert: Option<f64>,

    /// Multiplicative slack around `samples_per_insert`.
    pub tolerance: f64,

    /// Seconds a sampler waits for data before giving up.
    pub sample_timeout_secs: f64,

    /// Random seed used for sampling.
    pub seed: u64,

    /// Where completed episodes are persisted.
    pub directory: Option<PathBuf>,

    /// Prioritized sampling, used with [`ReplayKind::Reverb`].
    pub priority: PriorityConfig,

    /// Declared fields. If `None`, inferred from the first transition.
    pub schema: Option<Schema>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            batch_length: 64,
            kind: ReplayKind::Uniform,
            min_size: 1,
            samples_per_insert: None,
            tolerance: 10.0,
            sample_timeout_secs: 600.0,
            seed: 42,
            directory: None,
            priority: PriorityConfig::default(),
            schema: None,
        }
    }
}

impl ReplayConfig {
    /// Sets the capacity in transitions.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the window length.
    pub fn batch_length(mut self, batch_length: usize) -> Self {
        self.batch_length = batch_length;
        self
    }

    /// Sets the replay kind.
    pub fn kind(mut self, kind: ReplayKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the number of windows required before sampling.
    pub fn min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Enables rate limiting.
    pub fn samples_per_insert(mut self, v: Option<f64>) -> Self {
        self.samples_per_insert = v;
        self
    }

    /// Sets the tolerance of rate limiting.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the sampling timeout.
    pub fn sample_timeout(mut self, timeout: Duration) -> Self {
        self.sample_timeout_secs = timeout.as_secs_f64();
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the directory for persisted episodes.
    pub fn directory(mut self, directory: Option<PathBuf>) -> Self {
        self.directory = directory;
        self
    }

    /// Sets the configuration of prioritized sampling.
    pub fn priority(mut self, priority: PriorityConfig) -> Self {
        self.priority = priority;
        self
    }

    /// Declares the schema of transitions.
    pub fn schema(mut self, schema: Option<Schema>) -> Self {
        self.schema = schema;
        self
    }

    /// The sampling timeout as a [`Duration`].
    pub fn sample_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.sample_timeout_secs.max(0.0))
    }

    /// Rejects inconsistent settings.
    pub fn validate(&self) -> Result<(), DynaloopError> {
        let err = |msg: &str| Err(DynaloopError::Config(msg.to_string()));
        if self.capacity == 0 {
            return err("replay capacity must be positive");
        }
        if self.batch_length == 0 {
            return err("batch_length must be positive");
        }
        if self.min_size == 0 {
            return err("min_size must be at least 1");
        }
        if !self.sample_timeout_secs.is_finite() || self.sample_timeout_secs < 0.0 {
            return err("sample_timeout_secs must be a non-negative number");
        }
        if let Some(spi) = self.samples_per_insert {
            if self.kind != ReplayKind::Uniform {
                return err("rate limiting requires the uniform replay");
            }
            if !(spi > 0.0) {
                return err("samples_per_insert must be positive");
            }
            if !(self.tolerance >= 1.0) {
                return err("tolerance must be at least 1");
            }
        }
        if self.kind == ReplayKind::Reverb && !(self.priority.alpha >= 0.0) {
            return err("priority alpha must be non-negative");
        }
        Ok(())
    }

    /// Constructs [`ReplayConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ReplayConfig`].
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
    fn test_serde_replay_config() -> Result<()> {
        let config = ReplayConfig::default()
            .capacity(100)
            .batch_length(8)
            .kind(ReplayKind::Reverb)
            .priority(PriorityConfig::default().alpha(0.6).initial_priority(None));
        let dir = TempDir::new("replay_config")?;
        let path = dir.path().join("replay.yaml");
        config.save(&path)?;
        assert_eq!(ReplayConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_rate_limit_requires_uniform() {
        let config = ReplayConfig::default()
            .kind(ReplayKind::Reverb)
            .samples_per_insert(Some(1.0));
        assert!(matches!(config.validate(), Err(DynaloopError::Config(_))));

        let config = config.kind(ReplayKind::Uniform);
        assert!(config.validate().is_ok());
        assert!(config.tolerance(0.5).validate().is_err());
    }

    #[test]
    fn test_replay_kind_from_str() {
        assert_eq!("reverb".parse::<ReplayKind>().unwrap(), ReplayKind::Reverb);
        assert_eq!("chunks".parse::<ReplayKind>().unwrap(), ReplayKind::Chunks);
        assert!("ring".parse::<ReplayKind>().is_err());
    }
}
