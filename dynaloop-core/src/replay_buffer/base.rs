//! Episode-structured replay buffer shared by environment workers and the trainer.
use super::{
    episode::{episode_filename, episode_paths, load_episode, Episode, EpisodeWriter},
    Batch, IwScheduler, PriorityConfig, RateLimiter, ReplayConfig, ReplayKind, ReplayStats,
    SumTree, Window, WindowKey,
};
use crate::{
    error::DynaloopError,
    transition::{Schema, Transition},
};
use anyhow::{anyhow, bail, Result};
use log::{debug, info, trace, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::{HashMap, VecDeque},
    path::Path,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    time::Instant,
};

/// State of prioritized sampling.
struct PerState {
    /// Slot weights. One slot per window.
    sum_tree: SumTree,

    /// Unused slots.
    free: Vec<usize>,

    /// Window occupying each slot.
    slot_keys: Vec<Option<WindowKey>>,

    /// Scheduler for importance sampling weights.
    iw_scheduler: IwScheduler,

    /// Priority of fresh windows. `None` uses the current maximum.
    initial_priority: Option<f32>,
}

impl PerState {
    fn new(capacity: usize, config: &PriorityConfig) -> Self {
        Self {
            sum_tree: SumTree::new(capacity, config.alpha),
            free: (0..capacity).rev().collect(),
            slot_keys: vec![None; capacity],
            iw_scheduler: IwScheduler::new(config.beta_0, config.beta_final, config.n_opts_final),
            initial_priority: config.initial_priority,
        }
    }

    fn fresh_priority(&self) -> f32 {
        match self.initial_priority {
            Some(p) => p,
            None => {
                let max = self.sum_tree.max();
                if max > 0.0 {
                    max
                } else {
                    1.0
                }
            }
        }
    }
}

/// A sampleable window of a stored episode.
struct Entry {
    episode: Arc<Episode>,
    start: usize,

    /// Position in the dense key table.
    pos: usize,

    /// Slot in the sum tree, prioritized mode only.
    slot: Option<usize>,
}

/// A closed episode held by the buffer.
struct Stored {
    len: usize,
    keys: Vec<WindowKey>,
}

struct Inner {
    schema: Option<Schema>,

    /// Episodes under construction, by worker.
    open: HashMap<usize, Vec<Transition>>,

    /// Closed episodes, oldest first.
    episodes: VecDeque<Stored>,

    entries: HashMap<WindowKey, Entry>,

    /// Dense table of window keys for O(1) uniform sampling.
    keys: Vec<WindowKey>,

    per_state: Option<PerState>,
    rate_limiter: Option<RateLimiter>,
    rng: StdRng,

    transitions: usize,
    next_episode: u64,
    next_key: u64,
    inserts: u64,
    samples: u64,
    evicted_episodes: u64,
    evicted_transitions: u64,
}

/// Replay buffer storing whole episodes and serving fixed-length windows.
///
/// The buffer is shared behind an [`Arc`]. Any number of workers call
/// [`ReplayBuffer::add`] concurrently while the trainer samples; all state is
/// guarded by one mutex and starved samplers wait on a condition variable
/// that is notified whenever an episode is committed, or, under rate
/// limiting, whenever a transition is added.
///
/// Capacity counts transitions. When a committed episode does not fit, whole
/// episodes are evicted oldest first, so no window ever refers to evicted data.
/// Sampled windows are copies and stay valid after eviction.
///
/// ```
/// use dynaloop_core::{replay_buffer::{ReplayBuffer, ReplayConfig}, transition::Transition};
/// # fn main() -> anyhow::Result<()> {
/// let replay = ReplayBuffer::build(&ReplayConfig::default().capacity(100).batch_length(2))?;
/// for i in 0..4 {
///     replay.add(Transition::new(1.0, i == 0, i == 3, false), 0)?;
/// }
/// let batch = replay.sample(2)?;
/// assert_eq!(batch.batch_length(), 2);
/// # Ok(())
/// # }
/// ```
pub struct ReplayBuffer {
    config: ReplayConfig,
    inner: Mutex<Inner>,
    cond: Condvar,
    writer: Option<EpisodeWriter>,
}

impl ReplayBuffer {
    /// Builds a replay buffer.
    ///
    /// The configuration is validated first. If `directory` is set, committed
    /// episodes are persisted there by a background thread.
    pub fn build(config: &ReplayConfig) -> Result<Self> {
        config.validate()?;

        let per_state = match config.kind {
            ReplayKind::Reverb => Some(PerState::new(config.capacity, &config.priority)),
            _ => None,
        };
        let rate_limiter = config
            .samples_per_insert
            .map(|spi| RateLimiter::new(spi, config.tolerance));
        let writer = match &config.directory {
            Some(dir) => Some(EpisodeWriter::spawn(dir.clone())?),
            None => None,
        };

        info!(
            "Replay buffer: kind = {:?}, capacity = {}, batch_length = {}",
            config.kind, config.capacity, config.batch_length
        );

        Ok(Self {
            config: config.clone(),
            inner: Mutex::new(Inner {
                schema: config.schema.clone(),
                open: HashMap::new(),
                episodes: VecDeque::new(),
                entries: HashMap::new(),
                keys: Vec::new(),
                per_state,
                rate_limiter,
                rng: StdRng::seed_from_u64(config.seed),
                transitions: 0,
                next_episode: 0,
                next_key: 0,
                inserts: 0,
                samples: 0,
                evicted_episodes: 0,
                evicted_transitions: 0,
            }),
            cond: Condvar::new(),
            writer,
        })
    }

    /// Configuration of the buffer.
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Adds a transition produced by worker `worker_id`.
    ///
    /// A transition with `is_first` opens an episode for the worker, one with
    /// `is_last` commits it. Until committed, an episode is invisible to
    /// sampling. This method never blocks on sampling.
    ///
    /// # Errors
    ///
    /// [`DynaloopError::MalformedTransition`] if the transition does not match
    /// the schema, or if it continues an episode the worker never opened.
    pub fn add(&self, tran: Transition, worker_id: usize) -> Result<()> {
        let mut inner = self.lock();

        if inner.schema.is_none() {
            let schema = Schema::infer(&tran);
            debug!("Inferred transition schema: {:?}", schema);
            inner.schema = Some(schema);
        }
        if let Some(schema) = &inner.schema {
            schema.validate(&tran)?;
        }

        if tran.is_first() {
            if let Some(partial) = inner.open.insert(worker_id, Vec::new()) {
                if !partial.is_empty() {
                    warn!(
                        "Worker {} restarted an episode, dropped {} uncommitted transitions",
                        worker_id,
                        partial.len()
                    );
                }
            }
        }

        let is_last = tran.is_last();
        match inner.open.get_mut(&worker_id) {
            Some(open) => open.push(tran),
            None => {
                return Err(DynaloopError::MalformedTransition(format!(
                    "worker {} has no open episode, expected is_first",
                    worker_id
                ))
                .into())
            }
        }
        inner.inserts += 1;

        let rate_limited = inner.rate_limiter.is_some();
        if is_last {
            let transitions = inner.open.remove(&worker_id).unwrap_or_default();
            self.commit(&mut inner, Episode::new(transitions), true);
        }
        drop(inner);
        if is_last || rate_limited {
            self.cond.notify_all();
        }
        Ok(())
    }

    /// Stores a closed episode, evicting old episodes if needed.
    fn commit(&self, inner: &mut Inner, episode: Episode, persist: bool) {
        let len = episode.len();
        let id = inner.next_episode;
        inner.next_episode += 1;

        let episode = Arc::new(episode);
        if persist {
            if let Some(writer) = &self.writer {
                writer.write(episode_filename(id, len), episode.clone());
            }
        }

        // Stored episodes are kept when the new one can never fit.
        if len > self.config.capacity {
            warn!(
                "Episode of length {} exceeds the capacity {}, discarded",
                len, self.config.capacity
            );
            inner.evicted_episodes += 1;
            inner.evicted_transitions += len as u64;
            return;
        }

        while inner.transitions + len > self.config.capacity && !inner.episodes.is_empty() {
            Self::evict_oldest(inner);
        }

        let l = self.config.batch_length;
        let stride = self.config.kind.stride(l);
        let mut keys = Vec::new();
        if len >= l {
            for start in (0..=len - l).step_by(stride) {
                let key = WindowKey(inner.next_key);
                inner.next_key += 1;

                let slot = match &mut inner.per_state {
                    Some(per_state) => {
                        let p = per_state.fresh_priority();
                        // Windows never outnumber stored transitions, so a slot is free.
                        let slot = per_state.free.pop();
                        if let Some(slot) = slot {
                            per_state.sum_tree.update(slot, p);
                            per_state.slot_keys[slot] = Some(key);
                        }
                        slot
                    }
                    None => None,
                };

                let pos = inner.keys.len();
                inner.keys.push(key);
                inner.entries.insert(
                    key,
                    Entry {
                        episode: episode.clone(),
                        start,
                        pos,
                        slot,
                    },
                );
                keys.push(key);
            }
        }

        trace!("Committed episode {} with {} windows", id, keys.len());
        inner.transitions += len;
        inner.episodes.push_back(Stored { len, keys });
    }

    fn evict_oldest(inner: &mut Inner) {
        let stored = match inner.episodes.pop_front() {
            Some(stored) => stored,
            None => return,
        };
        for key in stored.keys {
            let entry = match inner.entries.remove(&key) {
                Some(entry) => entry,
                None => continue,
            };
            inner.keys.swap_remove(entry.pos);
            if let Some(&moved) = inner.keys.get(entry.pos) {
                if let Some(e) = inner.entries.get_mut(&moved) {
                    e.pos = entry.pos;
                }
            }
            if let (Some(per_state), Some(slot)) = (&mut inner.per_state, entry.slot) {
                per_state.sum_tree.clear(slot);
                per_state.slot_keys[slot] = None;
                per_state.free.push(slot);
            }
        }
        inner.transitions -= stored.len;
        inner.evicted_episodes += 1;
        inner.evicted_transitions += stored.len as u64;
    }

    /// Why `n` windows cannot be sampled right now, if they cannot.
    fn starved(&self, inner: &Inner, n: usize) -> Option<String> {
        let windows = inner.keys.len();
        if windows == 0 || windows < self.config.min_size {
            return Some(format!(
                "{} windows stored, {} required",
                windows,
                self.config.min_size.max(1)
            ));
        }
        if let Some(rate_limiter) = &inner.rate_limiter {
            if !rate_limiter.can_sample(inner.inserts, inner.samples, n) {
                return Some(format!(
                    "rate limited at {} samples for {} inserts",
                    inner.samples, inner.inserts
                ));
            }
        }
        None
    }

    /// Samples a batch of `n` windows.
    ///
    /// Blocks while fewer than `min_size` windows are stored or the rate
    /// limiter forbids sampling, up to the configured timeout.
    ///
    /// # Errors
    ///
    /// [`DynaloopError::SampleTimeout`] if the buffer stayed starved.
    pub fn sample(&self, n: usize) -> Result<Batch> {
        let timeout = self.config.sample_timeout_duration();
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();

        loop {
            match self.starved(&inner, n) {
                None => break,
                Some(reason) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DynaloopError::SampleTimeout(timeout, reason).into());
                    }
                    trace!("Sampling blocked: {}", reason);
                    inner = self.cond.wait_timeout(inner, deadline - now).unwrap().0;
                }
            }
        }

        self.draw(&mut inner, n)
    }

    fn draw(&self, inner: &mut Inner, n: usize) -> Result<Batch> {
        let l = self.config.batch_length;
        let inner = &mut *inner;

        let (keys, weights) = match &inner.per_state {
            None => {
                let mut keys = Vec::with_capacity(n);
                for _ in 0..n {
                    let ix = inner.rng.gen_range(0..inner.keys.len());
                    keys.push(inner.keys[ix]);
                }
                (keys, None)
            }
            Some(per_state) => {
                let sum_tree = &per_state.sum_tree;
                let total = sum_tree.total();
                let beta = per_state.iw_scheduler.beta() as f64;
                let num = inner.keys.len() as f64;
                let mut keys = Vec::with_capacity(n);
                let mut weights = Vec::with_capacity(n);
                for _ in 0..n {
                    let slot = sum_tree.sample(inner.rng.gen::<f64>());
                    let key = per_state.slot_keys[slot]
                        .ok_or_else(|| anyhow!("Sampled free slot {}", slot))?;
                    let prob = sum_tree.weight(slot) / total;
                    keys.push(key);
                    weights.push((num * prob).powf(-beta));
                }
                let max = weights.iter().cloned().fold(f64::MIN, f64::max);
                let weights = weights.iter().map(|w| (w / max) as f32).collect::<Vec<_>>();
                (keys, Some(weights))
            }
        };

        let windows = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let entry = inner
                    .entries
                    .get(key)
                    .ok_or_else(|| anyhow!("Unknown window {:?}", key))?;
                Ok(Window {
                    key: *key,
                    transitions: entry.episode.window(entry.start, l),
                    weight: weights.as_ref().map(|w| w[i]),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        inner.samples += n as u64;
        Ok(Batch::new(windows))
    }

    /// Sets the priorities of sampled windows.
    ///
    /// Keys of windows evicted since sampling are ignored. In uniform modes
    /// this is a no-op. Returns the number of windows updated.
    pub fn prioritize(&self, keys: &[WindowKey], priorities: &[f32]) -> Result<usize> {
        if keys.len() != priorities.len() {
            bail!(
                "{} keys but {} priorities in priority update",
                keys.len(),
                priorities.len()
            );
        }

        let mut inner = self.lock();
        let inner = &mut *inner;
        let per_state = match &mut inner.per_state {
            Some(per_state) => per_state,
            None => return Ok(0),
        };

        let mut updated = 0;
        for (key, &p) in keys.iter().zip(priorities.iter()) {
            if !p.is_finite() {
                warn!("Ignored non-finite priority {} for {:?}", p, key);
                continue;
            }
            match inner.entries.get(key).and_then(|e| e.slot) {
                Some(slot) => {
                    per_state.sum_tree.update(slot, p);
                    updated += 1;
                }
                None => debug!("Window {:?} no longer stored", key),
            }
        }
        per_state.iw_scheduler.add_n_opts();
        Ok(updated)
    }

    /// Snapshot of the buffer state.
    pub fn stats(&self) -> ReplayStats {
        let inner = self.lock();
        ReplayStats {
            episodes: inner.episodes.len(),
            transitions: inner.transitions,
            capacity: self.config.capacity,
            windows: inner.keys.len(),
            inserts: inner.inserts,
            samples: inner.samples,
            evicted_episodes: inner.evicted_episodes,
            evicted_transitions: inner.evicted_transitions,
            open_episodes: inner.open.values().filter(|v| !v.is_empty()).count(),
            lagging: inner
                .rate_limiter
                .as_ref()
                .map_or(false, |r| r.is_lagging(inner.inserts, inner.samples)),
        }
    }

    /// Loads persisted episodes from `dir`, oldest first.
    ///
    /// Unreadable or malformed files are skipped with a warning. Returns the
    /// number of episodes loaded.
    pub fn load(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut loaded = 0;
        for path in episode_paths(dir)? {
            let episode = match load_episode(&path) {
                Ok(episode) => episode,
                Err(e) => {
                    warn!("Skipped episode {:?}: {}", path, e);
                    continue;
                }
            };
            if !episode.is_closed() {
                warn!("Skipped episode {:?}: not a closed episode", path);
                continue;
            }

            let mut inner = self.lock();
            if inner.schema.is_none() {
                inner.schema = Some(Schema::infer(&episode.transitions()[0]));
            }
            let valid = match &inner.schema {
                Some(schema) => episode.transitions().iter().try_for_each(|t| schema.validate(t)),
                None => Ok(()),
            };
            if let Err(e) = valid {
                warn!("Skipped episode {:?}: {}", path, e);
                continue;
            }
            inner.inserts += episode.len() as u64;
            self.commit(&mut inner, episode, false);
            loaded += 1;
        }

        info!("Loaded {} episodes from {:?}", loaded, dir);
        self.cond.notify_all();
        Ok(loaded)
    }

    /// Drops the open episode of a worker, e.g. after its environment failed.
    ///
    /// Returns the number of discarded transitions.
    pub fn discard(&self, worker_id: usize) -> usize {
        let n = self.lock().open.remove(&worker_id).map_or(0, |v| v.len());
        if n > 0 {
            debug!("Discarded {} transitions of worker {}", n, worker_id);
        }
        n
    }

    /// Waits until all committed episodes are persisted.
    pub fn flush(&self) -> Result<()> {
        match &self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::Value;
    use std::{collections::HashSet, time::Duration};
    use tempdir::TempDir;

    fn add_episode(replay: &ReplayBuffer, len: usize, worker_id: usize, tag: f32) -> Result<()> {
        for i in 0..len {
            let tran = Transition::new(tag, i == 0, i + 1 == len, false)
                .with("t", Value::Int(i as i64));
            replay.add(tran, worker_id)?;
        }
        Ok(())
    }

    fn config() -> ReplayConfig {
        ReplayConfig::default()
            .capacity(100)
            .batch_length(4)
            .sample_timeout(Duration::from_millis(50))
    }

    #[test]
    fn test_fifo_eviction() -> Result<()> {
        let replay = ReplayBuffer::build(&config())?;
        for e in 0..5 {
            add_episode(&replay, 30, 0, e as f32)?;
        }
        let stats = replay.stats();
        assert_eq!(stats.transitions, 90);
        assert_eq!(stats.episodes, 3);
        assert_eq!(stats.evicted_episodes, 2);
        assert_eq!(stats.evicted_transitions, 60);
        assert_eq!(stats.windows, 3 * 27);

        // Only the three newest episodes remain.
        let batch = replay.sample(200)?;
        for window in batch.windows() {
            assert!(window.transitions[0].reward() >= 2.0);
        }
        Ok(())
    }

    #[test]
    fn test_oversized_episode_keeps_stored_ones() -> Result<()> {
        let replay = ReplayBuffer::build(&config().capacity(20))?;
        add_episode(&replay, 10, 0, 0.0)?;
        add_episode(&replay, 10, 0, 1.0)?;
        add_episode(&replay, 25, 0, 2.0)?;

        let stats = replay.stats();
        assert_eq!(stats.episodes, 2);
        assert_eq!(stats.transitions, 20);
        assert_eq!(stats.evicted_episodes, 1);
        assert_eq!(stats.evicted_transitions, 25);
        for window in replay.sample(50)?.windows() {
            assert!(window.transitions[0].reward() < 2.0);
        }
        Ok(())
    }

    #[test]
    fn test_windows_stay_within_episode() -> Result<()> {
        let replay = ReplayBuffer::build(&config())?;
        add_episode(&replay, 10, 0, 0.0)?;
        let batch = replay.sample(100)?;
        let mut starts = HashSet::new();
        for window in batch.windows() {
            let t = window
                .transitions
                .iter()
                .map(|tran| match tran.get("t") {
                    Some(Value::Int(t)) => *t,
                    _ => -1,
                })
                .collect::<Vec<_>>();
            assert_eq!(t.len(), 4);
            assert!(t[0] >= 0 && t[3] <= 9);
            assert!(t.windows(2).all(|w| w[1] == w[0] + 1));
            starts.insert(t[0]);
        }
        assert!(starts.len() > 1);
        assert!(starts.iter().all(|s| *s <= 6));
        Ok(())
    }

    #[test]
    fn test_chunks_do_not_overlap() -> Result<()> {
        let replay = ReplayBuffer::build(&config().kind(ReplayKind::Chunks))?;
        add_episode(&replay, 10, 0, 0.0)?;
        assert_eq!(replay.stats().windows, 2);
        Ok(())
    }

    #[test]
    fn test_short_episode_has_no_windows() -> Result<()> {
        let replay = ReplayBuffer::build(&config())?;
        add_episode(&replay, 3, 0, 0.0)?;
        let stats = replay.stats();
        assert_eq!(stats.episodes, 1);
        assert_eq!(stats.windows, 0);
        assert!(replay.sample(1).is_err());
        Ok(())
    }

    #[test]
    fn test_malformed_transition() -> Result<()> {
        let replay = ReplayBuffer::build(&config())?;
        add_episode(&replay, 5, 0, 0.0)?;

        let tran = Transition::new(0.0, true, false, false);
        let err = replay.add(tran, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DynaloopError>(),
            Some(DynaloopError::MalformedTransition(_))
        ));

        let tran = Transition::new(0.0, false, false, false).with("t", Value::Int(1));
        let err = replay.add(tran, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DynaloopError>(),
            Some(DynaloopError::MalformedTransition(_))
        ));
        Ok(())
    }

    #[test]
    fn test_open_episode_is_not_sampled() -> Result<()> {
        let replay = ReplayBuffer::build(&config())?;
        for i in 0..10 {
            let tran = Transition::new(0.0, i == 0, false, false).with("t", Value::Int(i));
            replay.add(tran, 0)?;
        }
        assert_eq!(replay.stats().open_episodes, 1);

        let err = replay.sample(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DynaloopError>(),
            Some(DynaloopError::SampleTimeout(..))
        ));

        assert_eq!(replay.discard(0), 10);
        assert_eq!(replay.stats().open_episodes, 0);
        Ok(())
    }

    #[test]
    fn test_sample_waits_for_commit() -> Result<()> {
        let replay = Arc::new(ReplayBuffer::build(
            &config().sample_timeout(Duration::from_secs(10)),
        )?);
        let replay_ = replay.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            add_episode(&replay_, 8, 3, 0.0)
        });
        let batch = replay.sample(2)?;
        assert_eq!(batch.len(), 2);
        handle.join().unwrap()?;
        Ok(())
    }

    #[test]
    fn test_rate_limit() -> Result<()> {
        let replay = ReplayBuffer::build(&config().samples_per_insert(Some(0.5)).tolerance(2.0))?;
        add_episode(&replay, 10, 0, 0.0)?;

        // At most 0.5 * 2 samples per inserted transition.
        replay.sample(6)?;
        replay.sample(4)?;
        assert!(replay.sample(1).is_err());

        add_episode(&replay, 10, 0, 0.0)?;
        replay.sample(10)?;
        assert_eq!(replay.stats().samples, 20);
        Ok(())
    }

    #[test]
    fn test_priority_sampling_frequency() -> Result<()> {
        let config = config()
            .kind(ReplayKind::Reverb)
            .priority(PriorityConfig::default().initial_priority(Some(1.0)));
        let replay = ReplayBuffer::build(&config)?;
        // Two episodes of exactly one window each.
        add_episode(&replay, 4, 0, 0.0)?;
        add_episode(&replay, 4, 0, 1.0)?;

        let keys = replay.sample(64)?.keys();
        let key_of = |tag: f32| -> Result<WindowKey> {
            let batch = replay.sample(64)?;
            batch
                .windows()
                .iter()
                .find(|w| w.transitions[0].reward() == tag)
                .map(|w| w.key)
                .ok_or_else(|| anyhow!("window not sampled"))
        };
        assert!(!keys.is_empty());
        let (k0, k1) = (key_of(0.0)?, key_of(1.0)?);
        assert_eq!(replay.prioritize(&[k0, k1], &[1.0, 3.0])?, 2);

        let n = 20000;
        let batch = replay.sample(n)?;
        let n1 = batch.windows().iter().filter(|w| w.key == k1).count();
        let freq = n1 as f64 / n as f64;
        assert!((freq - 0.75).abs() < 0.02, "freq = {}", freq);

        // The rare window gets the larger importance weight.
        let weights = batch.weights().unwrap_or_default();
        let w0 = batch.windows().iter().position(|w| w.key == k0).map(|i| weights[i]);
        assert_eq!(w0, Some(1.0));
        Ok(())
    }

    #[test]
    fn test_prioritize_evicted_key_is_ignored() -> Result<()> {
        let replay = ReplayBuffer::build(&config().capacity(8).kind(ReplayKind::Reverb))?;
        add_episode(&replay, 4, 0, 0.0)?;
        let key = replay.sample(1)?.keys()[0];
        add_episode(&replay, 4, 0, 1.0)?;
        add_episode(&replay, 4, 0, 2.0)?;
        assert_eq!(replay.prioritize(&[key], &[5.0])?, 0);
        assert!(replay.prioritize(&[key], &[]).is_err());
        Ok(())
    }

    #[test]
    fn test_concurrent_add() -> Result<()> {
        let replay = Arc::new(ReplayBuffer::build(&config().capacity(10_000))?);
        let handles = (0..4)
            .map(|worker_id| {
                let replay = replay.clone();
                std::thread::spawn(move || -> Result<()> {
                    for e in 0..10 {
                        add_episode(&replay, 5 + e, worker_id, worker_id as f32)?;
                    }
                    Ok(())
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap()?;
        }

        let stats = replay.stats();
        assert_eq!(stats.episodes, 40);
        assert_eq!(stats.transitions, 4 * (5..15).sum::<usize>());
        for window in replay.sample(500)?.windows() {
            let tag = window.transitions[0].reward();
            assert!(window.transitions.iter().all(|t| t.reward() == tag));
        }
        Ok(())
    }

    #[test]
    fn test_persist_and_load() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new("replay_persist")?;
        let episodes = dir.path().join("episodes");
        {
            let replay = ReplayBuffer::build(&config().directory(Some(episodes.clone())))?;
            add_episode(&replay, 6, 0, 0.0)?;
            add_episode(&replay, 7, 1, 1.0)?;
            replay.flush()?;
        }

        let replay = ReplayBuffer::build(&config().capacity(8))?;
        assert_eq!(replay.load(&episodes)?, 2);
        let stats = replay.stats();
        assert_eq!(stats.episodes, 1);
        assert_eq!(stats.transitions, 7);

        std::fs::write(episodes.join("garbage.episode"), b"not an episode")?;
        let replay = ReplayBuffer::build(&config())?;
        assert_eq!(replay.load(&episodes)?, 2);
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(ReplayBuffer::build(&config().capacity(0)).is_err());
        let config = config()
            .kind(ReplayKind::Chunks)
            .samples_per_insert(Some(1.0));
        assert!(ReplayBuffer::build(&config).is_err());
    }
}
