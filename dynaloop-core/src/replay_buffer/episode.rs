//! Episodes and their persistence on disk.
use crate::transition::Transition;
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Sender};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    thread::JoinHandle,
};

/// File extension of persisted episodes.
pub const EPISODE_EXT: &str = "episode";

/// A closed sequence of transitions from `is_first` to `is_last`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    transitions: Vec<Transition>,
}

impl Episode {
    /// Wraps transitions of a closed episode.
    pub fn new(transitions: Vec<Transition>) -> Self {
        Self { transitions }
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// `true` if there are no transitions.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// The transitions.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Copies `len` transitions starting at `start`.
    pub fn window(&self, start: usize, len: usize) -> Vec<Transition> {
        self.transitions[start..start + len].to_vec()
    }

    /// `true` if the episode starts with `is_first` and only its last
    /// transition is flagged `is_last`.
    pub fn is_closed(&self) -> bool {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => {
                first.is_first()
                    && last.is_last()
                    && self.transitions[..self.len() - 1].iter().all(|t| !t.is_last())
            }
            _ => false,
        }
    }
}

/// File name of a persisted episode. Names sort in insertion order.
///
/// The name starts with a UTC timestamp, which never jumps backwards at
/// daylight saving changes.
pub fn episode_filename(id: u64, len: usize) -> String {
    let time = chrono::Utc::now().format("%Y%m%dT%H%M%S%6fZ");
    format!("{}-{:012}-{}.{}", time, id, len, EPISODE_EXT)
}

/// Writes an episode to `dir/name` atomically.
pub fn save_episode(dir: &Path, name: &str, episode: &Episode) -> Result<PathBuf> {
    let path = dir.join(name);
    let tmp = dir.join(format!("{}.tmp", name));
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(&mut writer, episode)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, &path)?;
    Ok(path)
}

/// Reads an episode file.
pub fn load_episode(path: &Path) -> Result<Episode> {
    let rdr = BufReader::new(File::open(path)?);
    let episode = bincode::deserialize_from(rdr)
        .with_context(|| format!("Failed to decode episode {:?}", path))?;
    Ok(episode)
}

/// Paths of all persisted episodes in `dir`, sorted by file name.
pub fn episode_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == EPISODE_EXT))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

enum WriterMessage {
    Write(String, Arc<Episode>),
    Flush(Sender<()>),
}

/// Persists episodes on a background thread so that `add()` never waits for disk.
pub struct EpisodeWriter {
    dir: PathBuf,
    sender: Option<Sender<WriterMessage>>,
    handle: Option<JoinHandle<()>>,
}

impl EpisodeWriter {
    /// Spawns the writer thread for `dir`, creating the directory.
    pub fn spawn(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        let (sender, receiver) = unbounded::<WriterMessage>();
        let dir_ = dir.clone();
        let handle = std::thread::Builder::new()
            .name("episode-writer".to_string())
            .spawn(move || {
                for msg in receiver.iter() {
                    match msg {
                        WriterMessage::Write(name, episode) => {
                            match save_episode(&dir_, &name, &episode) {
                                Ok(path) => debug!("Saved episode {:?}", path),
                                Err(e) => error!("Failed to save episode {}: {:?}", name, e),
                            }
                        }
                        WriterMessage::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                debug!("Stopped episode writer for {:?}", dir_);
            })?;
        Ok(Self {
            dir,
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Directory episodes are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queues an episode for writing.
    pub fn write(&self, name: String, episode: Arc<Episode>) {
        if let Some(sender) = &self.sender {
            if sender.send(WriterMessage::Write(name, episode)).is_err() {
                warn!("Episode writer for {:?} has stopped", self.dir);
            }
        }
    }

    /// Blocks until every queued episode is on disk.
    pub fn flush(&self) -> Result<()> {
        if let Some(sender) = &self.sender {
            let (ack_s, ack_r) = unbounded();
            sender.send(WriterMessage::Flush(ack_s))?;
            ack_r.recv()?;
        }
        Ok(())
    }
}

impl Drop for EpisodeWriter {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain the queue and exit.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Episode writer thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn episode(len: usize) -> Episode {
        Episode::new(
            (0..len)
                .map(|i| Transition::new(i as f32, i == 0, i + 1 == len, false))
                .collect(),
        )
    }

    #[test]
    fn test_is_closed() {
        assert!(episode(3).is_closed());
        assert!(episode(1).is_closed());
        assert!(!Episode::new(vec![]).is_closed());
        let mut ts = episode(3).transitions().to_vec();
        ts.pop();
        assert!(!Episode::new(ts).is_closed());
    }

    #[test]
    fn test_writer_flush_and_order() -> Result<()> {
        let dir = TempDir::new("episode_writer")?;
        let writer = EpisodeWriter::spawn(dir.path().join("episodes"))?;
        for id in 0..3 {
            writer.write(episode_filename(id, 4 + id as usize), Arc::new(episode(4 + id as usize)));
        }
        writer.flush()?;

        let paths = episode_paths(writer.dir())?;
        assert_eq!(paths.len(), 3);
        let lens = paths
            .iter()
            .map(|p| load_episode(p).map(|e| e.len()))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(lens, vec![4, 5, 6]);
        Ok(())
    }

    #[test]
    fn test_filename_is_utc() -> Result<()> {
        let name = episode_filename(7, 12);
        assert!(name.ends_with(&format!("-000000000007-12.{}", EPISODE_EXT)));

        let (stamp, _) = name.split_once('Z').context("no UTC marker")?;
        let time = chrono::NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%S%6f")?;
        let delta = chrono::Utc::now().naive_utc() - time;
        assert!(delta.num_seconds().abs() < 60);
        Ok(())
    }
}
