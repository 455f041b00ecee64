//! Persistence of the agent state and the step counters.
use crate::{counter::Counter, error::DynaloopError, Agent};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

const MAGIC: [u8; 8] = *b"DYNACKPT";

/// Version of the checkpoint format.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    magic: [u8; 8],
    version: u32,
    step: u64,
    real_step: u64,
    saved_at: String,
    agent: Vec<u8>,
}

/// Counters restored from a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restored {
    /// Value of the step counter.
    pub step: u64,

    /// Value of the real-step counter.
    pub real_step: u64,
}

/// Saves and restores the agent together with the step and real-step
/// counters, so that a run resumes exactly where it stopped.
///
/// A save writes a temporary file next to the checkpoint and renames it into
/// place. A crash during a save leaves the previous checkpoint intact. Saves
/// are serialized, so concurrent callers never interleave their writes.
pub struct Checkpoint {
    path: PathBuf,
    seed: Option<PathBuf>,
    lock: Mutex<()>,
}

impl Checkpoint {
    /// Creates a checkpoint at `path`. Nothing is read or written yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            seed: None,
            lock: Mutex::new(()),
        }
    }

    /// Starts a fresh run from another checkpoint.
    ///
    /// [`Checkpoint::load_or_save`] reads `seed` when this checkpoint does not
    /// exist yet. An existing checkpoint always takes precedence.
    pub fn seed(mut self, seed: Option<PathBuf>) -> Self {
        self.seed = seed;
        self
    }

    /// Path of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if a checkpoint file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the current agent state and counters.
    pub fn save<A: Agent>(&self, agent: &A, step: &Counter, real_step: &Counter) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        let snapshot = Snapshot {
            magic: MAGIC,
            version: CHECKPOINT_VERSION,
            step: step.value(),
            real_step: real_step.value(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            agent: agent.save_state()?,
        };

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            bincode::serialize_into(&mut writer, &snapshot)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        info!(
            "Saved checkpoint {:?} at step {} (real step {})",
            self.path, snapshot.step, snapshot.real_step
        );
        Ok(())
    }

    /// Restores the agent and counters from the checkpoint at `path`.
    ///
    /// # Errors
    ///
    /// [`DynaloopError::CheckpointMissing`] if there is no file at `path`,
    /// [`DynaloopError::CheckpointCorrupt`] if it cannot be decoded.
    pub fn load<A: Agent>(
        path: impl AsRef<Path>,
        agent: &mut A,
        step: &Counter,
        real_step: &Counter,
    ) -> Result<Restored> {
        let path = path.as_ref();
        let corrupt = |reason: String| DynaloopError::CheckpointCorrupt {
            path: path.display().to_string(),
            reason,
        };

        if !path.is_file() {
            return Err(DynaloopError::CheckpointMissing(path.display().to_string()).into());
        }
        let rdr = BufReader::new(File::open(path)?);
        let snapshot: Snapshot =
            bincode::deserialize_from(rdr).map_err(|e| corrupt(e.to_string()))?;
        if snapshot.magic != MAGIC {
            return Err(corrupt("not a checkpoint file".to_string()).into());
        }
        if snapshot.version != CHECKPOINT_VERSION {
            return Err(corrupt(format!("unsupported version {}", snapshot.version)).into());
        }
        agent
            .load_state(&snapshot.agent)
            .map_err(|e| corrupt(format!("agent state: {}", e)))?;

        step.restore(snapshot.step);
        real_step.restore(snapshot.real_step);
        info!(
            "Loaded checkpoint {:?} saved at {}, step {} (real step {})",
            path, snapshot.saved_at, snapshot.step, snapshot.real_step
        );
        Ok(Restored {
            step: snapshot.step,
            real_step: snapshot.real_step,
        })
    }

    /// Loads this checkpoint if it exists, otherwise saves the current state.
    ///
    /// Without a checkpoint of its own, the seed checkpoint, if any, is loaded
    /// first and saved as this one. Calling it again right after has no
    /// further effect on the agent or the counters. Returns what was loaded,
    /// if anything.
    pub fn load_or_save<A: Agent>(
        &self,
        agent: &mut A,
        step: &Counter,
        real_step: &Counter,
    ) -> Result<Option<Restored>> {
        if self.exists() {
            return Self::load(&self.path, agent, step, real_step).map(Some);
        }
        let restored = match &self.seed {
            Some(seed) => Some(Self::load(seed, agent, step, real_step)?),
            None => None,
        };
        self.save(agent, step, real_step)?;
        Ok(restored)
    }
}
