//! Runs dynaloop training from a YAML configuration and command line flags.
//!
//! * [`RunConfig`] - every option of a run, validated before anything starts
//! * [`EnvRegistry`] - environment suites selected by `<suite>_<task>`
//! * [`BaselineAgent`] - a minimal learner exercising the training loop
//! * [`run()`] - the `train` and `train_offline` scripts
//!
//! Each run writes to `<logdir>_<seed>`: `config.yaml`, `metrics.jsonl`,
//! `scores.jsonl`, the recorded `episodes/` and `checkpoint.ckpt`.
mod agent;
mod args;
mod config;
mod envs;
mod run;
pub use agent::{BaselineAgent, BaselineAgentConfig};
pub use args::Args;
pub use config::{RunConfig, Script};
pub use envs::{DummyEnv, EnvRegistry, SuiteFactory};
pub use run::{
    make_logger, make_replay, run, train, train_offline, RunSummary, EPISODES_DIR, SCORES_FILTER,
};
