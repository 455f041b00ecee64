//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum DynaloopError {
    /// A transition did not match the schema of the replay buffer.
    #[error("Malformed transition: {0}")]
    MalformedTransition(String),

    /// A checkpoint file exists but could not be decoded.
    #[error("Checkpoint at {path} is corrupt: {reason}")]
    CheckpointCorrupt {
        /// Path of the checkpoint.
        path: String,
        /// What went wrong while decoding.
        reason: String,
    },

    /// No checkpoint file at the given path.
    #[error("Checkpoint not found: {0}")]
    CheckpointMissing(String),

    /// Invalid configuration, detected before allocating resources.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Sampling stayed blocked for longer than the configured timeout.
    #[error("Timed out after {0:?} waiting for samples: {1}")]
    SampleTimeout(std::time::Duration, String),

    /// A wrapped environment failed.
    #[error("Environment failure in worker {worker}: {reason}")]
    EnvironmentFailure {
        /// Worker owning the environment instance.
        worker: usize,
        /// Error reported by the environment.
        reason: String,
    },

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
