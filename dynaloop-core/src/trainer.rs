//! Train [`Agent`].
mod config;
mod timer;
mod usage;
use crate::{
    checkpoint::Checkpoint,
    counter::Counter,
    record::{Logger, Metrics, Record},
    replay_buffer::Batch,
    when::{Every, Ratio},
    Agent, Dataset,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::{debug, info};
pub use timer::Timer;
pub use usage::Usage;

/// Lifecycle of a [`Trainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    /// Waiting for [`Trainer::pretrain`].
    Pretrain,

    /// Training in step with the environment.
    Running,

    /// The step budget is exhausted or the run was stopped.
    Stopped,
}

/// Drives training steps of an agent from environment steps.
///
/// # Training loop
///
/// 0. [`Trainer::pretrain`] runs `pretrain` training iterations without
///    logging, to initialize stateful parts of the agent.
/// 1. On every environment step the caller increments the step counter and
///    calls [`Trainer::tick`]:
///     1. `train_ratio / (batch_size * batch_length)` training iterations are
///        owed per step. The owed number, zero or more, is run, each pulling
///        a batch from the [`Dataset`] and threading the carried state
///        through [`Agent::train`]. Metrics are aggregated under `train/`.
///        Priorities returned by the agent go back to the replay buffer.
///     2. Every `log_every` steps the aggregated metrics, an agent report on
///        the latest batch (`report/`, dropping keys already aggregated as
///        `train/`), replay statistics (`replay/`), timers (`timer/`),
///        resource usage (`usage/`) and `real_step` are written in one call
///        with `fps`.
/// 2. Every `save_every` steps, [`Trainer::should_save`] tells the caller to
///    save a [`Checkpoint`].
///
/// [`Trainer::train`] runs this loop without environments, for training on a
/// buffer filled ahead of time.
pub struct Trainer<A: Agent> {
    config: TrainerConfig,
    state: TrainerState,
    dataset: Dataset,
    logger: Logger,
    should_train: Ratio,
    should_log: Every,
    should_save: Every,
    carry: Option<A::Carry>,
    last_batch: Option<Batch>,
    metrics: Metrics,
    timer: Timer,
    usage: Usage,
    n_train: u64,
}

impl<A: Agent> Trainer<A> {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig, dataset: Dataset, logger: Logger) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            should_train: Ratio::new(config.updates_per_step()),
            should_log: Every::new(config.log_every),
            should_save: Every::new(config.save_every),
            config,
            state: TrainerState::Pretrain,
            dataset,
            logger,
            carry: None,
            last_batch: None,
            metrics: Metrics::new(),
            timer: Timer::new(),
            usage: Usage::new(),
            n_train: 0,
        })
    }

    /// Current state.
    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Number of calls to [`Agent::train`] so far, pretraining included.
    pub fn n_train(&self) -> u64 {
        self.n_train
    }

    /// The dataset batches are pulled from.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The logger, e.g. to add episode statistics before the next write.
    pub fn logger_mut(&mut self) -> &mut Logger {
        &mut self.logger
    }

    /// Accumulates metrics reduced at the next log write.
    pub fn add_metrics(&mut self, record: Record, prefix: &str) {
        self.metrics.add(record, prefix);
    }

    fn train_iteration(&mut self, agent: &mut A) -> Result<()> {
        let dataset = &mut self.dataset;
        let batch = self
            .timer
            .scope("dataset", || dataset.next())
            .unwrap_or_else(|| Err(anyhow::anyhow!("Dataset exhausted")))?;

        let carry = match self.carry.take() {
            Some(carry) => carry,
            None => agent.init_train(self.config.batch_size),
        };
        let out = self.timer.scope("train", || agent.train(&batch, carry))?;
        self.carry = Some(out.carry);
        self.n_train += 1;

        if self.state == TrainerState::Running {
            self.metrics.add(out.metrics, "train");
            if let Some(update) = out.priorities {
                let n = self
                    .dataset
                    .replay()
                    .prioritize(&update.keys, &update.priorities)?;
                debug!("Updated {} of {} priorities", n, update.keys.len());
            }
        }
        self.last_batch = Some(batch);
        Ok(())
    }

    /// Runs the pretraining iterations and enters [`TrainerState::Running`].
    pub fn pretrain(&mut self, agent: &mut A) -> Result<()> {
        if self.state != TrainerState::Pretrain {
            return Ok(());
        }
        info!("Pretrain for {} iterations", self.config.pretrain);
        for _ in 0..self.config.pretrain {
            self.train_iteration(agent)?;
        }
        self.state = TrainerState::Running;
        Ok(())
    }

    /// Reacts to one environment step at `step`.
    ///
    /// Returns the number of training iterations run.
    pub fn tick(&mut self, agent: &mut A, step: u64, real_step: &Counter) -> Result<usize> {
        if self.state == TrainerState::Pretrain {
            self.pretrain(agent)?;
        }
        if self.state != TrainerState::Running {
            return Ok(0);
        }

        let n = self.should_train.check(step);
        for _ in 0..n {
            self.train_iteration(agent)?;
        }

        if self.should_log.check(step) {
            self.log(agent, step, real_step)?;
        }
        Ok(n)
    }

    fn log(&mut self, agent: &mut A, step: u64, real_step: &Counter) -> Result<()> {
        let agg = self.metrics.result();
        if let Some(batch) = &self.last_batch {
            let report = self.timer.scope("report", || agent.report(batch))?;
            let report = report
                .into_iter_in_record()
                .filter(|(k, _)| !agg.contains_key(&format!("train/{}", k)))
                .collect::<Record>();
            self.logger.add(agg, "");
            self.logger.add(report, "report");
        } else {
            self.logger.add(agg, "");
        }
        self.logger
            .add(self.dataset.replay().stats().to_record(), "replay");
        self.logger.add(self.timer.stats(), "timer");
        self.logger.add(self.usage.stats(), "usage");
        self.logger.scalar("real_step", real_step.value() as f32);
        self.logger.write(step, true)
    }

    /// `true` if a checkpoint is due at `step`.
    ///
    /// The first call fires, which registers the save done at startup.
    pub fn should_save(&mut self, step: u64) -> bool {
        self.should_save.check(step)
    }

    /// Saves a checkpoint, accounting the time to the `checkpoint` timer.
    pub fn save(
        &mut self,
        checkpoint: &Checkpoint,
        agent: &A,
        step: &Counter,
        real_step: &Counter,
    ) -> Result<()> {
        self.timer
            .scope("checkpoint", || checkpoint.save(agent, step, real_step))
    }

    /// Enters [`TrainerState::Stopped`] and flushes the logger.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != TrainerState::Stopped {
            info!("Stopped training after {} iterations", self.n_train);
            self.state = TrainerState::Stopped;
        }
        self.logger.flush()
    }

    /// Trains on the replay buffer alone until the step budget is exhausted.
    ///
    /// Each loop iteration counts as one step. The checkpoint is loaded or
    /// created before the loop and saved every `save_every` steps. The final
    /// save is left to the caller.
    pub fn train(
        &mut self,
        agent: &mut A,
        step: &Counter,
        real_step: &Counter,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        self.pretrain(agent)?;
        checkpoint.load_or_save(agent, step, real_step)?;
        self.should_save(step.value());

        info!("Start training loop");
        while step.value() < self.config.steps {
            let s = step.increment();
            self.tick(agent, s, real_step)?;
            if self.should_save(s) {
                self.save(checkpoint, agent, step, real_step)?;
            }
        }
        self.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        record::{BufferedRecorder, NullRecorder, RecordValue},
        replay_buffer::{PriorityUpdate, ReplayBuffer, ReplayConfig, ReplayKind},
        transition::Transition,
        IntoDataset, TrainOutput,
    };
    use std::{sync::Arc, time::Duration};
    use tempdir::TempDir;

    /// Counts training steps in its carried state.
    #[derive(Default)]
    struct CountingAgent {
        trained: u64,
        inits: u64,
        carries: Vec<u64>,
        prioritize: bool,
    }

    impl Agent for CountingAgent {
        type Carry = u64;

        fn init_train(&self, _batch_size: usize) -> u64 {
            0
        }

        fn train(&mut self, batch: &Batch, carry: u64) -> Result<TrainOutput<u64>> {
            if carry == 0 {
                self.inits += 1;
            }
            self.trained += 1;
            self.carries.push(carry);
            let priorities = match self.prioritize {
                true => Some(PriorityUpdate {
                    keys: batch.keys(),
                    priorities: vec![2.0; batch.len()],
                }),
                false => None,
            };
            Ok(TrainOutput {
                carry: carry + 1,
                metrics: Record::from_slice(&[
                    ("loss", RecordValue::Scalar(carry as f32)),
                    ("grad_norm", RecordValue::Scalar(1.0)),
                ]),
                priorities,
            })
        }

        fn report(&mut self, _batch: &Batch) -> Result<Record> {
            Ok(Record::from_slice(&[
                ("loss", RecordValue::Scalar(-1.0)),
                ("openloop", RecordValue::Scalar(3.0)),
            ]))
        }

        fn save_state(&self) -> Result<Vec<u8>> {
            Ok(bincode::serialize(&self.trained)?)
        }

        fn load_state(&mut self, state: &[u8]) -> Result<()> {
            self.trained = bincode::deserialize(state)?;
            Ok(())
        }
    }

    fn replay(kind: ReplayKind) -> Result<Arc<ReplayBuffer>> {
        let config = ReplayConfig::default()
            .capacity(1000)
            .batch_length(4)
            .kind(kind)
            .sample_timeout(Duration::from_millis(100));
        let replay = Arc::new(ReplayBuffer::build(&config)?);
        for _ in 0..5 {
            for i in 0..10 {
                replay.add(Transition::new(1.0, i == 0, i == 9, false), 0)?;
            }
        }
        Ok(replay)
    }

    fn config() -> TrainerConfig {
        // One training iteration per step.
        TrainerConfig::default()
            .steps(10)
            .pretrain(5)
            .batch_size(2)
            .batch_length(4)
            .train_ratio(8.0)
            .log_every(5)
            .save_every(0)
    }

    #[test]
    fn test_offline_training_counts() -> Result<()> {
        let dir = TempDir::new("trainer")?;
        let replay = replay(ReplayKind::Uniform)?;
        let buf = BufferedRecorder::new();
        let logger = Logger::new(vec![Box::new(buf.clone())]);
        let mut trainer = Trainer::build(config(), replay.dataset(2), logger)?;
        let mut agent = CountingAgent::default();
        let (step, real_step) = (Counter::new(0), Counter::new(0));
        let checkpoint = Checkpoint::new(dir.path().join("checkpoint.ckpt"));

        assert_eq!(trainer.state(), TrainerState::Pretrain);
        trainer.train(&mut agent, &step, &real_step, &checkpoint)?;
        assert_eq!(trainer.state(), TrainerState::Stopped);

        assert_eq!(step.value(), 10);
        assert_eq!(agent.trained, 15);
        assert_eq!(trainer.n_train(), 15);
        // The carried state is threaded through every call.
        assert_eq!(agent.inits, 1);
        assert_eq!(agent.carries, (0..15).collect::<Vec<_>>());
        assert!(checkpoint.exists());
        Ok(())
    }

    #[test]
    fn test_log_writes() -> Result<()> {
        let replay = replay(ReplayKind::Uniform)?;
        let buf = BufferedRecorder::new();
        let logger = Logger::new(vec![Box::new(buf.clone())]);
        let mut trainer = Trainer::build(config(), replay.dataset(2), logger)?;
        let mut agent = CountingAgent::default();
        let real_step = Counter::new(7);

        trainer.pretrain(&mut agent)?;
        for s in 1..=10 {
            trainer.tick(&mut agent, s, &real_step)?;
        }

        // Logs at steps 1, 6.
        let records = buf.records();
        assert_eq!(records.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 6]);
        let record = &records[1].1;
        // Pretraining metrics are not aggregated: carries 6..=10 at steps 2..=6.
        assert_eq!(record.get_scalar("train/loss")?, 8.0);
        assert_eq!(record.get_scalar("train/grad_norm")?, 1.0);
        assert!(!record.contains_key("report/loss"));
        assert_eq!(record.get_scalar("report/openloop")?, 3.0);
        assert_eq!(record.get_scalar("real_step")?, 7.0);
        assert_eq!(record.get_scalar("replay/episodes")?, 5.0);
        assert!(record.contains_key("timer/train_count"));
        assert!(record.contains_key("fps"));
        assert!(!records[0].1.contains_key("fps"));
        Ok(())
    }

    #[test]
    fn test_fractional_ratio() -> Result<()> {
        let replay = replay(ReplayKind::Uniform)?;
        let config = config().train_ratio(2.0).log_every(0);
        let logger = Logger::new(vec![Box::new(NullRecorder::default())]);
        let mut trainer = Trainer::build(config, replay.dataset(2), logger)?;
        let mut agent = CountingAgent::default();
        let real_step = Counter::new(0);
        trainer.pretrain(&mut agent)?;

        // A quarter iteration per step.
        let n = (1..=17)
            .map(|s| trainer.tick(&mut agent, s, &real_step))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(n.iter().sum::<usize>(), 5);
        assert_eq!(n[1..4], [0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_priority_feedback() -> Result<()> {
        let replay = replay(ReplayKind::Reverb)?;
        let mut trainer = Trainer::build(config(), replay.dataset(2), Logger::new(vec![]))?;
        let mut agent = CountingAgent {
            prioritize: true,
            ..Default::default()
        };
        let real_step = Counter::new(0);
        trainer.pretrain(&mut agent)?;
        trainer.tick(&mut agent, 1, &real_step)?;
        assert_eq!(agent.trained, 6);
        Ok(())
    }

    #[test]
    fn test_resume_from_checkpoint() -> Result<()> {
        let dir = TempDir::new("trainer")?;
        let checkpoint = Checkpoint::new(dir.path().join("checkpoint.ckpt"));
        let replay = replay(ReplayKind::Uniform)?;
        let (step, real_step) = (Counter::new(0), Counter::new(0));

        let mut trainer = Trainer::build(config(), replay.dataset(2), Logger::new(vec![]))?;
        let mut agent = CountingAgent::default();
        trainer.train(&mut agent, &step, &real_step, &checkpoint)?;
        trainer.save(&checkpoint, &agent, &step, &real_step)?;

        let config = config().steps(12);
        let mut trainer = Trainer::build(config, replay.dataset(2), Logger::new(vec![]))?;
        let mut agent = CountingAgent::default();
        let (step, real_step) = (Counter::new(0), Counter::new(0));
        trainer.train(&mut agent, &step, &real_step, &checkpoint)?;
        assert_eq!(step.value(), 12);
        // 15 restored, then 5 pretraining and 2 steps. Pretraining ran before
        // the restore, so only the two steps add to the restored count.
        assert_eq!(agent.trained, 17);
        Ok(())
    }
}
