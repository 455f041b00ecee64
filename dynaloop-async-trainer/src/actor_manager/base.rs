use crate::{
    Actor, ActorManagerConfig, ActorMessage, ActorStat, EnvFactory, EpisodeKeys, EpisodeStats,
    PolicyFactory,
};
use anyhow::Result;
use crossbeam_channel::Sender;
use dynaloop_core::{error::DynaloopError, replay_buffer::ReplayBuffer, Counter};
use log::{error, info, warn};
use std::{
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

/// Manages [`Actor`]s.
///
/// Each actor runs in its own thread with its own environment and policy,
/// adding transitions to the shared replay buffer and reporting steps and
/// episodes to the [`AsyncTrainer`] through one channel.
///
/// [`AsyncTrainer`]: crate::AsyncTrainer
pub struct ActorManager {
    config: ActorManagerConfig,
    episode_keys: EpisodeKeys,
    env_factory: EnvFactory,
    policy_factory: PolicyFactory,
    replay: Arc<ReplayBuffer>,
    real_step: Arc<Counter>,

    /// Sender of [`ActorMessage`]s to [AsyncTrainer](crate::AsyncTrainer).
    ///
    /// Handed over to the actors in [`ActorManager::run`], so the channel
    /// disconnects once every actor has exited.
    sender: Option<Sender<ActorMessage>>,

    /// Flag to stop actors.
    stop: Arc<Mutex<bool>>,

    /// Thread handles.
    threads: Vec<JoinHandle<Result<ActorStat>>>,

    /// Stats of [Actor]s, shared with actor threads.
    actor_stats: Vec<Arc<Mutex<Option<ActorStat>>>>,
}

impl ActorManager {
    /// Builds a [`ActorManager`].
    ///
    /// Fails on an invalid configuration, before any thread is spawned.
    pub fn build(
        config: &ActorManagerConfig,
        env_factory: EnvFactory,
        policy_factory: PolicyFactory,
        replay: Arc<ReplayBuffer>,
        real_step: Arc<Counter>,
        sender: Sender<ActorMessage>,
        stop: Arc<Mutex<bool>>,
    ) -> Result<Self> {
        if config.n_actors == 0 {
            return Err(DynaloopError::Config("n_actors must be positive".to_string()).into());
        }
        let episode_keys = EpisodeKeys::new(
            &config.log_keys_sum,
            &config.log_keys_mean,
            &config.log_keys_max,
            config.log_zeros,
        )
        .map_err(|e| DynaloopError::Config(format!("log keys: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            episode_keys,
            env_factory,
            policy_factory,
            replay,
            real_step,
            sender: Some(sender),
            stop,
            threads: vec![],
            actor_stats: vec![],
        })
    }

    /// Runs threads for [`Actor`]s.
    ///
    /// `guard_init_env` serializes the construction of environments.
    pub fn run(&mut self, guard_init_env: Arc<Mutex<bool>>) {
        let sender = match self.sender.take() {
            Some(sender) => sender,
            None => {
                warn!("Actors are already running");
                return;
            }
        };
        for id in 0..self.config.n_actors {
            let stats = Arc::new(Mutex::new(None));
            self.actor_stats.push(stats.clone());
            let mut actor = Actor::build(
                id,
                self.env_factory.clone(),
                self.policy_factory.clone(),
                self.replay.clone(),
                self.real_step.clone(),
                sender.clone(),
                EpisodeStats::new(self.episode_keys.clone()),
                self.config.max_restarts,
                self.stop.clone(),
                stats,
            );
            let guard = guard_init_env.clone();

            // Spawn actor thread
            let handle = std::thread::Builder::new()
                .name(format!("actor-{}", id))
                .spawn(move || actor.run(guard));
            match handle {
                Ok(handle) => self.threads.push(handle),
                Err(e) => error!("Failed to spawn actor {}: {}", id, e),
            }
        }
        info!("Started {} actors", self.threads.len());
    }

    /// Number of actors configured.
    pub fn n_actors(&self) -> usize {
        self.config.n_actors
    }

    /// Stops actor threads.
    pub fn stop(&self) {
        let mut stop = self.stop.lock().unwrap();
        *stop = true;
    }

    /// Waits until all actors finish.
    ///
    /// Returns the stats of every actor, including those that failed.
    pub fn join(self) -> Vec<ActorStat> {
        for (id, h) in self.threads.into_iter().enumerate() {
            match h.join() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Actor {} stopped with an error: {:#}", id, e),
                Err(_) => error!("Actor {} panicked", id),
            }
        }

        self.actor_stats
            .iter()
            .map(|e| e.lock().unwrap().clone().unwrap_or_default())
            .collect::<Vec<_>>()
    }

    /// Stops and joins actors.
    pub fn stop_and_join(self) -> Vec<ActorStat> {
        self.stop();
        self.join()
    }
}
