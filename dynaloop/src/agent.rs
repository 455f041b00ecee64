//! A baseline learner.
use anyhow::Result;
use dynaloop_core::{
    record::{Record, RecordValue},
    replay_buffer::{Batch, PriorityUpdate},
    Agent, TrainOutput,
};
use serde::{Deserialize, Serialize};

/// Configuration of [`BaselineAgent`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BaselineAgentConfig {
    /// Step size of the running estimate.
    pub lr: f32,

    /// Added to absolute errors to get priorities.
    pub priority_eps: f32,
}

impl Default for BaselineAgentConfig {
    fn default() -> Self {
        Self {
            lr: 0.05,
            priority_eps: 1e-3,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
struct State {
    value: f32,
    n_opts: u64,
}

/// Estimates the mean reward per transition of the replayed windows.
///
/// Each row of a batch carries the last reward it saw into the next training
/// step, standing in for the latent state of a recurrent model. The absolute
/// error of each window becomes its new priority.
pub struct BaselineAgent {
    config: BaselineAgentConfig,
    state: State,
}

impl BaselineAgent {
    /// Creates an agent.
    pub fn build(config: BaselineAgentConfig) -> Self {
        Self {
            config,
            state: State::default(),
        }
    }

    /// Current estimate of the mean reward.
    pub fn value(&self) -> f32 {
        self.state.value
    }

    /// Number of optimization steps so far.
    pub fn n_opts(&self) -> u64 {
        self.state.n_opts
    }

    fn errors(&self, batch: &Batch) -> Vec<f32> {
        batch
            .rewards()
            .iter()
            .map(|r| r.iter().sum::<f32>() / r.len().max(1) as f32 - self.state.value)
            .collect()
    }
}

impl Agent for BaselineAgent {
    type Carry = Vec<f32>;

    fn init_train(&self, batch_size: usize) -> Vec<f32> {
        vec![0.0; batch_size]
    }

    fn train(&mut self, batch: &Batch, carry: Vec<f32>) -> Result<TrainOutput<Vec<f32>>> {
        let errors = self.errors(batch);
        let weights = batch.weights().unwrap_or_else(|| vec![1.0; errors.len()]);
        let n = errors.len().max(1) as f32;
        let grad = errors
            .iter()
            .zip(weights.iter())
            .map(|(e, w)| e * w)
            .sum::<f32>()
            / n;
        let loss = errors.iter().map(|e| e * e).sum::<f32>() / n;
        self.state.value += self.config.lr * grad;
        self.state.n_opts += 1;

        let carry_norm = carry.iter().map(|c| c.abs()).sum::<f32>() / carry.len().max(1) as f32;
        let carry = batch
            .rewards()
            .iter()
            .map(|r| r.last().copied().unwrap_or_default())
            .collect();
        let priorities = errors
            .iter()
            .map(|e| e.abs() + self.config.priority_eps)
            .collect();

        Ok(TrainOutput {
            carry,
            metrics: Record::from_slice(&[
                ("loss", RecordValue::Scalar(loss)),
                ("value", RecordValue::Scalar(self.state.value)),
                ("carry_norm", RecordValue::Scalar(carry_norm)),
            ]),
            priorities: Some(PriorityUpdate {
                keys: batch.keys(),
                priorities,
            }),
        })
    }

    fn report(&mut self, batch: &Batch) -> Result<Record> {
        let errors = self.errors(batch);
        let n = errors.len().max(1) as f32;
        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(errors.iter().map(|e| e * e).sum::<f32>() / n)),
            ("abs_error", RecordValue::Scalar(errors.iter().map(|e| e.abs()).sum::<f32>() / n)),
            ("n_opts", RecordValue::Scalar(self.state.n_opts as f32)),
        ]))
    }

    fn save_state(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.state)?)
    }

    fn load_state(&mut self, state: &[u8]) -> Result<()> {
        self.state = bincode::deserialize(state)?;
        Ok(())
    }
}
