use super::{ActorStat, EpisodeStats};
use crate::ActorMessage;
use anyhow::Result;
use crossbeam_channel::{SendTimeoutError, Sender};
use dynaloop_core::{
    counter::count_real_step,
    error::DynaloopError,
    replay_buffer::ReplayBuffer,
    transition::{Fields, Transition, Value, IS_READ_STEP},
    Counter, Env, Policy, Spaces,
};
use log::{debug, error, info, warn};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Builds the environment of an actor, given the actor id and the number of
/// restarts so far.
pub type EnvFactory = Arc<dyn Fn(usize, usize) -> Result<Box<dyn Env + Send>> + Send + Sync>;

/// Builds the policy of an actor, given the actor id and the action space.
pub type PolicyFactory = Arc<dyn Fn(usize, &Spaces) -> Box<dyn Policy + Send> + Send + Sync>;

const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Observation waiting for an action.
struct Pending {
    obs: Fields,
    reward: f32,
    is_first: bool,
    is_last: bool,
    is_terminal: bool,
    is_read_step: bool,
}

/// Runs interaction between a [Policy] and an [Env], taking samples.
///
/// Every transition is added to the shared replay buffer under the actor id
/// and reported to [`AsyncTrainer`](crate::AsyncTrainer) as an
/// [`ActorMessage`]. A failing environment is rebuilt up to `max_restarts`
/// times; its open episode is discarded from the buffer.
pub struct Actor {
    /// Stops sampling process if this field is set to `true`.
    stop: Arc<Mutex<bool>>,
    id: usize,
    env_factory: EnvFactory,
    policy_factory: PolicyFactory,
    replay: Arc<ReplayBuffer>,
    real_step: Arc<Counter>,
    sender: Sender<ActorMessage>,
    episode_stats: EpisodeStats,
    max_restarts: usize,
    stat: Arc<Mutex<Option<ActorStat>>>,
}

impl Actor {
    /// Creates an actor. Nothing runs until [`Actor::run`].
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        id: usize,
        env_factory: EnvFactory,
        policy_factory: PolicyFactory,
        replay: Arc<ReplayBuffer>,
        real_step: Arc<Counter>,
        sender: Sender<ActorMessage>,
        episode_stats: EpisodeStats,
        max_restarts: usize,
        stop: Arc<Mutex<bool>>,
        stat: Arc<Mutex<Option<ActorStat>>>,
    ) -> Self {
        Self {
            stop,
            id,
            env_factory,
            policy_factory,
            replay,
            real_step,
            sender,
            episode_stats,
            max_restarts,
            stat,
        }
    }

    fn stopped(&self) -> bool {
        *self.stop.lock().unwrap()
    }

    /// Sends a message, giving up when the actor is stopped or nobody listens.
    fn send(&self, mut msg: ActorMessage) -> bool {
        loop {
            match self.sender.send_timeout(msg, SEND_TIMEOUT) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(m)) => {
                    if self.stopped() {
                        return false;
                    }
                    msg = m;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    fn failure(&self, e: anyhow::Error) -> anyhow::Error {
        DynaloopError::EnvironmentFailure {
            worker: self.id,
            reason: format!("{:#}", e),
        }
        .into()
    }

    fn build_env(&self, guard: &Mutex<bool>, restarts: usize) -> Result<Box<dyn Env + Send>> {
        let _guard = guard.lock().unwrap();
        (self.env_factory)(self.id, restarts).map_err(|e| self.failure(e))
    }

    /// Performs one environment step. Returns `false` when the actor should stop.
    fn step(
        &mut self,
        env: &mut dyn Env,
        policy: &mut dyn Policy,
        pending: &mut Option<Pending>,
        stat: &mut ActorStat,
    ) -> Result<bool> {
        let cur = match pending.take() {
            Some(cur) => cur,
            None => {
                let obs = env.reset().map_err(|e| self.failure(e))?;
                policy.reset();
                Pending {
                    obs,
                    reward: 0.0,
                    is_first: true,
                    is_last: false,
                    is_terminal: false,
                    is_read_step: false,
                }
            }
        };

        let act = policy.sample(&cur.obs);
        let mut tran = Transition::new(cur.reward, cur.is_first, cur.is_last, cur.is_terminal);
        tran.extend(cur.obs);
        tran.extend(act.clone());
        tran.insert(IS_READ_STEP, Value::Bool(cur.is_read_step));

        self.episode_stats.push(&tran);
        self.replay.add(tran.clone(), self.id)?;
        let real = count_real_step(&tran, &self.real_step);
        stat.env_steps += 1;
        if real {
            stat.real_steps += 1;
        }
        if !self.send(ActorMessage::Step {
            worker: self.id,
            real,
        }) {
            return Ok(false);
        }

        if cur.is_last {
            stat.episodes += 1;
            let (summary, stats) = self.episode_stats.finish();
            debug!(
                "Actor {}: episode has {:?} steps and return {:?}",
                self.id,
                summary.get_scalar("length").ok(),
                summary.get_scalar("score").ok()
            );
            return Ok(self.send(ActorMessage::Episode {
                worker: self.id,
                summary,
                stats,
            }));
        }

        let s = env.step(&act).map_err(|e| self.failure(e))?;
        *pending = Some(Pending {
            obs: s.obs,
            reward: s.reward,
            is_first: false,
            is_last: s.is_last,
            is_terminal: s.is_terminal,
            is_read_step: s.is_read_step,
        });
        Ok(true)
    }

    /// Runs sampling loop until `self.stop` becomes `true`.
    ///
    /// Environments are built while holding `guard_init_env`, which prevents
    /// simultaneous initialization of environments. If the actor stops with
    /// an error, [`ActorMessage::Failed`] is sent before returning it.
    pub fn run(&mut self, guard_init_env: Arc<Mutex<bool>>) -> Result<ActorStat> {
        let start = Instant::now();
        let mut stat = ActorStat::default();
        let result = self.run_loop(&guard_init_env, &mut stat);
        stat.duration = start.elapsed();
        *self.stat.lock().unwrap() = Some(stat.clone());
        match result {
            Ok(()) => {
                info!("Stopped actor {} after {} steps", self.id, stat.env_steps);
                Ok(stat)
            }
            Err(e) => {
                error!("Actor {} failed: {:#}", self.id, e);
                self.send(ActorMessage::Failed {
                    worker: self.id,
                    reason: format!("{:#}", e),
                });
                Err(e)
            }
        }
    }

    /// Rebuilds the environment after `failure`, until it succeeds or
    /// `max_restarts` is exceeded.
    fn restart(
        &self,
        guard: &Mutex<bool>,
        stat: &mut ActorStat,
        mut failure: anyhow::Error,
    ) -> Result<Box<dyn Env + Send>> {
        loop {
            stat.restarts += 1;
            if stat.restarts > self.max_restarts {
                return Err(failure);
            }
            warn!(
                "Restarting environment of actor {} ({}/{}): {}",
                self.id, stat.restarts, self.max_restarts, failure
            );
            self.send(ActorMessage::Restart {
                worker: self.id,
                reason: failure.to_string(),
            });
            match self.build_env(guard, stat.restarts) {
                Ok(env) => return Ok(env),
                Err(e) => failure = e,
            }
        }
    }

    fn run_loop(&mut self, guard: &Mutex<bool>, stat: &mut ActorStat) -> Result<()> {
        let mut env = match self.build_env(guard, 0) {
            Ok(env) => env,
            Err(e) => self.restart(guard, stat, e)?,
        };
        let mut policy = (self.policy_factory)(self.id, &env.act_space());
        let mut pending = None;

        while !self.stopped() {
            let failure = match self.step(env.as_mut(), policy.as_mut(), &mut pending, stat) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => match e.downcast_ref::<DynaloopError>() {
                    Some(DynaloopError::EnvironmentFailure { .. }) => e,
                    _ => return Err(e),
                },
            };

            // Restart the environment, dropping the open episode.
            pending = None;
            self.episode_stats.clear();
            self.replay.discard(self.id);
            env = self.restart(guard, stat, failure)?;
        }
        Ok(())
    }
}
