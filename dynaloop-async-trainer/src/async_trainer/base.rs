use crate::{actor_stats_fmt, ActorManager, ActorMessage, AsyncTrainStat, AsyncTrainerConfig};
use anyhow::{bail, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use dynaloop_core::{
    error::DynaloopError, record::Logger, Agent, Checkpoint, Counter, Dataset, Trainer,
    TrainerState,
};
use log::{info, warn};
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

/// Manages asynchronous training loop in a single machine.
///
/// It will be used with [ActorManager]. Every step message from an actor
/// increments the step counter and ticks the [`Trainer`]; episode messages
/// are logged under `episode/` and `stats/`. Training waits for enough
/// windows in the replay buffer before pretraining starts.
pub struct AsyncTrainer<A: Agent> {
    config: AsyncTrainerConfig,
    trainer: Trainer<A>,
    receiver: Receiver<ActorMessage>,
}

impl<A: Agent> AsyncTrainer<A> {
    /// Creates [AsyncTrainer].
    pub fn build(
        config: &AsyncTrainerConfig,
        dataset: Dataset,
        logger: Logger,
        receiver: Receiver<ActorMessage>,
    ) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            trainer: Trainer::build(config.trainer.clone(), dataset, logger)?,
            receiver,
        })
    }

    /// The training step driver.
    pub fn trainer(&self) -> &Trainer<A> {
        &self.trainer
    }

    /// Runs training loop until the step counter reaches its budget.
    ///
    /// The checkpoint is loaded, or created, before actors start. On return,
    /// actors are stopped and joined, the replay buffer is flushed and a
    /// final checkpoint is saved, also when training failed.
    pub fn train(
        &mut self,
        agent: &mut A,
        mut actors: ActorManager,
        step: &Counter,
        real_step: &Counter,
        checkpoint: &Checkpoint,
        guard_init_env: Arc<Mutex<bool>>,
    ) -> Result<AsyncTrainStat> {
        let start = Instant::now();
        let mut stat = AsyncTrainStat::default();

        if let Some(restored) = checkpoint.load_or_save(agent, step, real_step)? {
            info!("Resuming from step {}", restored.step);
        }
        self.trainer.should_save(step.value());

        let n_actors = actors.n_actors();
        actors.run(guard_init_env);
        let result = self.train_loop(agent, n_actors, step, real_step, checkpoint, &mut stat);

        let actor_stats = actors.stop_and_join();
        info!("Actor stats:\n{}", actor_stats_fmt(&actor_stats));
        let flushed = self.trainer.dataset().replay().flush();
        let saved = self.trainer.save(checkpoint, agent, step, real_step);
        let stopped = self.trainer.stop();
        result?;
        flushed?;
        saved?;
        stopped?;

        stat.train_steps = self.trainer.n_train();
        stat.duration = start.elapsed();
        info!("Training stats:\n{}", stat.fmt());
        Ok(stat)
    }

    fn ready(&self) -> bool {
        let replay = self.trainer.dataset().replay();
        replay.stats().windows >= replay.config().min_size
    }

    fn train_loop(
        &mut self,
        agent: &mut A,
        n_actors: usize,
        step: &Counter,
        real_step: &Counter,
        checkpoint: &Checkpoint,
        stat: &mut AsyncTrainStat,
    ) -> Result<()> {
        let timeout = self.config.message_timeout_duration();
        let mut failed = 0;

        while step.value() < self.trainer.config().steps {
            match self.receiver.recv_timeout(timeout) {
                Ok(ActorMessage::Step { .. }) => {
                    stat.env_steps += 1;
                    let s = step.increment();
                    // Steps taken while the buffer fills up are not trained on.
                    if self.trainer.state() == TrainerState::Pretrain && !self.ready() {
                        continue;
                    }
                    self.trainer.tick(agent, s, real_step)?;
                    if self.trainer.should_save(s) {
                        self.trainer.save(checkpoint, agent, step, real_step)?;
                    }
                }
                Ok(ActorMessage::Episode {
                    worker,
                    summary,
                    stats,
                }) => {
                    stat.episodes += 1;
                    info!(
                        "Actor {}: episode has {:?} steps and return {:?}",
                        worker,
                        summary.get_scalar("length").ok(),
                        summary.get_scalar("score").ok()
                    );
                    let logger = self.trainer.logger_mut();
                    logger.add(summary, "episode");
                    logger.scalar("real_step", real_step.value() as f32);
                    self.trainer.add_metrics(stats, "stats");
                }
                Ok(ActorMessage::Restart { worker, reason }) => {
                    stat.restarts += 1;
                    warn!("Actor {} restarted its environment: {}", worker, reason);
                }
                Ok(ActorMessage::Failed { worker, reason }) => {
                    failed += 1;
                    warn!("Actor {} gave up: {}", worker, reason);
                    if failed >= n_actors {
                        return Err(DynaloopError::EnvironmentFailure { worker, reason }.into());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    bail!("No message from actors for {:?}", timeout)
                }
                Err(RecvTimeoutError::Disconnected) => bail!("All actors disconnected"),
            }
        }
        Ok(())
    }
}
