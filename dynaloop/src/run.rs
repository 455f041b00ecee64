//! The `train` and `train_offline` scripts.
use crate::{BaselineAgent, BaselineAgentConfig, EnvRegistry, RunConfig, Script};
use anyhow::Result;
use crossbeam_channel::bounded;
use dynaloop_async_trainer::{ActorManager, AsyncTrainer, PolicyFactory};
use dynaloop_core::{
    record::{JsonlRecorder, Logger, Recorder, TerminalRecorder},
    replay_buffer::ReplayBuffer,
    Checkpoint, Counter, IntoDataset, Policy, RandomPolicy, Spaces, Trainer,
};
use dynaloop_tensorboard::TensorboardRecorder;
use log::info;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Keys written to `scores.jsonl`.
pub const SCORES_FILTER: &str = "^(episode/score|real_step)$";

/// Subdirectory of the run directory holding recorded episodes.
pub const EPISODES_DIR: &str = "episodes";

/// Counters at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Value of the step counter.
    pub step: u64,

    /// Value of the real-step counter.
    pub real_step: u64,

    /// Calls to the agent's training step in this process.
    pub train_steps: u64,
}

/// Writes metrics to the terminal, `metrics.jsonl`, `scores.jsonl` and
/// optionally Tensorboard, all under `logdir`.
pub fn make_logger(config: &RunConfig, logdir: &Path) -> Result<Logger> {
    let mut recorders: Vec<Box<dyn Recorder + Send>> = vec![
        Box::new(TerminalRecorder::new(None)?),
        Box::new(JsonlRecorder::new(logdir, "metrics.jsonl")?),
        Box::new(JsonlRecorder::new(logdir, "scores.jsonl")?.with_filter(SCORES_FILTER)?),
    ];
    if config.tensorboard {
        recorders.push(Box::new(TensorboardRecorder::new(logdir)));
    }
    Ok(Logger::new(recorders))
}

/// Builds the replay buffer, persisting episodes to `directory` if given.
pub fn make_replay(config: &RunConfig, directory: Option<PathBuf>) -> Result<Arc<ReplayBuffer>> {
    let replay = ReplayBuffer::build(&config.replay_config(directory))?;
    Ok(Arc::new(replay))
}

fn policy_factory(seed: u64) -> PolicyFactory {
    Arc::new(move |id, act_space: &Spaces| {
        Box::new(RandomPolicy::new(act_space.clone(), seed + id as u64)) as Box<dyn Policy + Send>
    })
}

fn checkpoint(config: &RunConfig, logdir: &Path) -> Checkpoint {
    Checkpoint::new(logdir.join("checkpoint.ckpt")).seed(config.from_checkpoint.clone())
}

/// Environment workers fill the buffer while the agent trains on it.
///
/// Episodes recorded by an earlier run in the same directory are loaded
/// back into the buffer before the workers start.
pub fn train(config: &RunConfig, registry: &EnvRegistry, logdir: &Path) -> Result<RunSummary> {
    let env_factory = registry.env_factory(&config.task, config.seed)?;
    let episodes = logdir.join(EPISODES_DIR);
    let replay = make_replay(config, Some(episodes.clone()))?;
    if episodes.is_dir() {
        let n = replay.load(&episodes)?;
        info!("Resuming with {} recorded episodes", n);
    }
    let logger = make_logger(config, logdir)?;

    let actor_man_config = config.actor_manager_config();
    let (sender, receiver) = bounded(actor_man_config.channel_capacity);
    let stop = Arc::new(Mutex::new(false));
    let real_step = Arc::new(Counter::default());
    let step = Counter::default();

    let actors = ActorManager::build(
        &actor_man_config,
        env_factory,
        policy_factory(config.seed),
        replay.clone(),
        real_step.clone(),
        sender,
        stop,
    )?;
    let mut trainer = AsyncTrainer::build(
        &config.async_trainer_config(),
        replay.dataset(config.batch_size),
        logger,
        receiver,
    )?;
    let mut agent = BaselineAgent::build(BaselineAgentConfig::default());

    // Prevents simultaneous initialization of environments
    let guard_init_env = Arc::new(Mutex::new(true));
    let stat = trainer.train(
        &mut agent,
        actors,
        &step,
        &real_step,
        &checkpoint(config, logdir),
        guard_init_env,
    )?;

    Ok(RunSummary {
        step: step.value(),
        real_step: real_step.value(),
        train_steps: stat.train_steps,
    })
}

/// Trains on recorded episodes, without environments.
///
/// Episodes are loaded from `load_directories`, or from the episodes of this
/// run if none are given. A checkpoint is saved at the end.
pub fn train_offline(config: &RunConfig, logdir: &Path) -> Result<RunSummary> {
    let replay = make_replay(config, None)?;
    let directories = match config.load_directories.is_empty() {
        true => vec![logdir.join(EPISODES_DIR)],
        false => config.load_directories.clone(),
    };
    for dir in directories.iter() {
        let n = replay.load(dir)?;
        info!("Loaded {} episodes from {:?}", n, dir);
    }

    let logger = make_logger(config, logdir)?;
    let mut trainer = Trainer::build(
        config.trainer_config(),
        replay.dataset(config.batch_size),
        logger,
    )?;
    let mut agent = BaselineAgent::build(BaselineAgentConfig::default());
    let (step, real_step) = (Counter::default(), Counter::default());
    let checkpoint = checkpoint(config, logdir);

    trainer.train(&mut agent, &step, &real_step, &checkpoint)?;
    trainer.save(&checkpoint, &agent, &step, &real_step)?;

    Ok(RunSummary {
        step: step.value(),
        real_step: real_step.value(),
        train_steps: trainer.n_train(),
    })
}

/// Validates the configuration, prepares the run directory and runs the script.
pub fn run(config: &RunConfig, registry: &EnvRegistry) -> Result<RunSummary> {
    config.validate(registry)?;
    let logdir = config.run_dir();
    fs::create_dir_all(&logdir)?;
    info!("Logdir {:?}", logdir);
    config.save(logdir.join("config.yaml"))?;

    let summary = match config.script {
        Script::Train => train(config, registry, &logdir)?,
        Script::TrainOffline => train_offline(config, &logdir)?,
    };
    info!(
        "Finished at step {} (real step {}) after {} training steps",
        summary.step, summary.real_step, summary.train_steps
    );
    Ok(summary)
}
