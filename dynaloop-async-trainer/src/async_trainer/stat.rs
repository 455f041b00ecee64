use std::time::Duration;

/// Stats of [`AsyncTrainer`](crate::AsyncTrainer)`::train()`.
#[derive(Clone, Debug, Default)]
pub struct AsyncTrainStat {
    /// Environment steps observed.
    pub env_steps: u64,

    /// Calls to the agent's training step, pretraining included.
    pub train_steps: u64,

    /// Committed episodes.
    pub episodes: u64,

    /// Environment restarts reported by actors.
    pub restarts: u64,

    /// Duration of training.
    pub duration: Duration,
}

impl AsyncTrainStat {
    /// Environment steps per second.
    pub fn samples_per_sec(&self) -> f32 {
        per_sec(self.env_steps, self.duration)
    }

    /// Training steps per second.
    pub fn opt_per_sec(&self) -> f32 {
        per_sec(self.train_steps, self.duration)
    }

    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let mut s = "samples/sec, opt_steps/sec, episodes, restarts, duration\n".to_string();
        s += format!(
            "{}, {}, {}, {}, {}\n",
            self.samples_per_sec(),
            self.opt_per_sec(),
            self.episodes,
            self.restarts,
            self.duration.as_secs_f32()
        )
        .as_str();
        s
    }
}

fn per_sec(n: u64, d: Duration) -> f32 {
    let secs = d.as_secs_f32();
    if secs > 0.0 {
        n as f32 / secs
    } else {
        0.0
    }
}
