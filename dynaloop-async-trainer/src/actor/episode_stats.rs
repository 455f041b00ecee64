//! Statistics of finished episodes.
use anyhow::Result;
use dynaloop_core::{
    record::{Record, RecordValue},
    transition::Transition,
};
use regex::Regex;
use std::collections::HashSet;

/// Regexes selecting the fields summarized at the end of each episode.
#[derive(Debug, Clone)]
pub struct EpisodeKeys {
    sum: Regex,
    mean: Regex,
    max: Regex,
    log_zeros: bool,
}

/// Patterns match at the start of the field name.
fn anchored(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})", pattern))?)
}

impl EpisodeKeys {
    /// Compiles the patterns. `^$` selects nothing.
    pub fn new(sum: &str, mean: &str, max: &str, log_zeros: bool) -> Result<Self> {
        Ok(Self {
            sum: anchored(sum)?,
            mean: anchored(mean)?,
            max: anchored(max)?,
            log_zeros,
        })
    }
}

/// Accumulates the transitions of the current episode of an actor.
#[derive(Debug)]
pub struct EpisodeStats {
    keys: EpisodeKeys,
    nonzeros: HashSet<String>,
    transitions: Vec<Transition>,
}

impl EpisodeStats {
    /// Creates an empty accumulator.
    pub fn new(keys: EpisodeKeys) -> Self {
        Self {
            keys,
            nonzeros: HashSet::new(),
            transitions: Vec::new(),
        }
    }

    /// Adds a transition. A transition with `is_first` starts over.
    pub fn push(&mut self, tran: &Transition) {
        if tran.is_first() {
            self.transitions.clear();
        }
        self.transitions.push(tran.clone());
    }

    /// Drops the current episode.
    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    /// Summarizes and clears the current episode.
    ///
    /// Returns the episode summary and the statistics of selected fields.
    pub fn finish(&mut self) -> (Record, Record) {
        let transitions = std::mem::take(&mut self.transitions);
        let rewards = transitions.iter().map(|t| t.reward() as f64).collect::<Vec<_>>();
        let n = rewards.len();
        let read_steps = transitions.iter().filter(|t| t.is_read_step()).count();
        let rate = if n > 0 {
            rewards.iter().filter(|r| r.abs() >= 0.5).count() as f32 / n as f32
        } else {
            0.0
        };

        let summary = Record::from_slice(&[
            ("length", RecordValue::Scalar(n.saturating_sub(1) as f32)),
            ("score", RecordValue::Scalar(rewards.iter().sum::<f64>() as f32)),
            (
                "sum_abs_reward",
                RecordValue::Scalar(rewards.iter().map(|r| r.abs()).sum::<f64>() as f32),
            ),
            ("reward_rate", RecordValue::Scalar(rate)),
            ("real_length", RecordValue::Scalar((n - read_steps) as f32)),
        ]);

        let mut stats = Record::empty();
        let keys = match transitions.first() {
            Some(t) => t.keys().cloned().collect::<Vec<_>>(),
            None => vec![],
        };
        for key in keys {
            // [time][element]
            let values = transitions
                .iter()
                .filter_map(|t| t.get(&key).map(|v| v.to_vec()))
                .collect::<Vec<_>>();
            let all_zero = values.iter().flatten().all(|v| *v == 0.0);
            if !self.keys.log_zeros && !self.nonzeros.contains(&key) && all_zero {
                continue;
            }
            self.nonzeros.insert(key.clone());

            let flat = values.iter().flatten().map(|v| *v as f64).collect::<Vec<_>>();
            if flat.is_empty() {
                continue;
            }
            if self.keys.sum.is_match(&key) {
                let sum = flat.iter().sum::<f64>();
                stats.insert(format!("sum_{}", key), RecordValue::Scalar(sum as f32));
            }
            if self.keys.mean.is_match(&key) {
                let mean = flat.iter().sum::<f64>() / flat.len() as f64;
                stats.insert(format!("mean_{}", key), RecordValue::Scalar(mean as f32));
            }
            if self.keys.max.is_match(&key) {
                stats.insert(format!("max_{}", key), RecordValue::Scalar(max_over_time(&values)));
            }
        }
        (summary, stats)
    }
}

/// Elementwise maximum over time, averaged over elements.
fn max_over_time(values: &[Vec<f32>]) -> f32 {
    let n = values.iter().map(|v| v.len()).min().unwrap_or(0);
    if n == 0 {
        return 0.0;
    }
    let sum = (0..n)
        .map(|i| values.iter().map(|v| v[i]).fold(f32::MIN, f32::max) as f64)
        .sum::<f64>();
    (sum / n as f64) as f32
}
