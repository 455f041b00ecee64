//! Lazy sequence of batches drawn from a shared replay buffer.
use crate::replay_buffer::{Batch, ReplayBuffer};
use anyhow::Result;
use std::sync::Arc;

/// Infinite iterator of batches sampled from a [`ReplayBuffer`].
///
/// The iterator holds no state besides the buffer handle and the batch size,
/// so cloning it or creating a new one restarts the sequence at no cost.
/// Each call to `next` blocks like [`ReplayBuffer::sample`] and yields
/// `Some(Err(_))` if sampling timed out; it never yields `None`.
#[derive(Clone)]
pub struct Dataset {
    replay: Arc<ReplayBuffer>,
    batch_size: usize,
}

impl Dataset {
    /// Creates a dataset of batches of `batch_size` windows.
    pub fn new(replay: Arc<ReplayBuffer>, batch_size: usize) -> Self {
        Self { replay, batch_size }
    }

    /// Number of windows per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The underlying buffer.
    pub fn replay(&self) -> &Arc<ReplayBuffer> {
        &self.replay
    }
}

impl Iterator for Dataset {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.replay.sample(self.batch_size))
    }
}

/// Extension to create a [`Dataset`] from a shared buffer.
pub trait IntoDataset {
    /// Dataset of batches of `batch_size` windows.
    fn dataset(&self, batch_size: usize) -> Dataset;
}

impl IntoDataset for Arc<ReplayBuffer> {
    fn dataset(&self, batch_size: usize) -> Dataset {
        Dataset::new(self.clone(), batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{replay_buffer::ReplayConfig, transition::Transition};
    use std::time::Duration;

    #[test]
    fn test_dataset_is_infinite_and_restartable() -> Result<()> {
        let config = ReplayConfig::default()
            .capacity(50)
            .batch_length(3)
            .sample_timeout(Duration::from_millis(20));
        let replay = Arc::new(ReplayBuffer::build(&config)?);

        // Empty buffer: the iterator reports the timeout and stays usable.
        let mut dataset = replay.dataset(4);
        assert!(matches!(dataset.next(), Some(Err(_))));

        for i in 0..5 {
            replay.add(Transition::new(0.0, i == 0, i == 4, false), 0)?;
        }
        let batches = dataset.by_ref().take(10).collect::<Result<Vec<_>>>()?;
        assert_eq!(batches.len(), 10);
        assert!(batches.iter().all(|b| b.len() == 4 && b.batch_length() == 3));

        let mut restarted = dataset.clone();
        assert_eq!(restarted.next().transpose()?.map(|b| b.len()), Some(4));
        assert_eq!(replay.stats().samples, 44);
        Ok(())
    }

    #[test]
    fn test_dataset_with_concurrent_producer() -> Result<()> {
        let config = ReplayConfig::default()
            .capacity(1000)
            .batch_length(2)
            .sample_timeout(Duration::from_secs(10));
        let replay = Arc::new(ReplayBuffer::build(&config)?);
        let producer = {
            let replay = replay.clone();
            std::thread::spawn(move || -> Result<()> {
                for _ in 0..20 {
                    for i in 0..4 {
                        replay.add(Transition::new(1.0, i == 0, i == 3, false), 7)?;
                    }
                }
                Ok(())
            })
        };
        for batch in replay.dataset(8).take(20) {
            assert_eq!(batch?.len(), 8);
        }
        producer.join().unwrap()?;
        assert_eq!(replay.stats().episodes, 20);
        Ok(())
    }
}
