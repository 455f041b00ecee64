use std::time::Duration;

/// Stats of sampling process in each [Actor](crate::Actor).
#[derive(Clone, Debug, Default)]
pub struct ActorStat {
    /// The number of steps for interaction between agent and env.
    pub env_steps: usize,

    /// Steps not flagged as read-only.
    pub real_steps: usize,

    /// Committed episodes.
    pub episodes: usize,

    /// Environment restarts after failures.
    pub restarts: usize,

    /// Duration of sampling loop in [Actor](crate::Actor).
    pub duration: Duration,
}

/// Returns a formatted string of the set of [ActorStat] for reporting.
pub fn actor_stats_fmt(stats: &[ActorStat]) -> String {
    let mut s = "actor id, samples, episodes, restarts, samples per sec, duration [sec]\n".to_string();
    for (i, stat) in stats.iter().enumerate() {
        let n = stat.env_steps;
        let d = stat.duration.as_secs_f32();
        let p = if d > 0.0 { (n as f32) / d } else { 0.0 };
        s += format!("{}, {}, {}, {}, {}, {}\n", i, n, stat.episodes, stat.restarts, p, d).as_str();
    }
    s
}
