use anyhow::Result;
use dynaloop_core::{
    error::DynaloopError,
    record::{Record, RecordValue},
    transition::{Fields, Space, Value},
    Env, EnvStep, Spaces,
};

/// Steps per episode.
const LENGTH: usize = 16;

/// Steps at the start of each episode that only read the instruction.
const READ_STEPS: usize = 4;

/// A deterministic toy task with an instruction to read.
///
/// Task `counter`: each episode draws a target action, 0 or 1. The first
/// steps show it as a token and are read steps; afterwards the agent earns
/// reward 1 for every step it picks the target. Episodes are truncated
/// after a fixed number of steps.
pub struct DummyEnv {
    rng: fastrand::Rng,
    target: i64,
    t: usize,
}

impl DummyEnv {
    /// Builds the environment for a task of the `dummy` suite.
    pub fn new(task: &str, seed: u64) -> Result<Self> {
        match task {
            "counter" => Ok(Self {
                rng: fastrand::Rng::with_seed(seed),
                target: 0,
                t: 0,
            }),
            _ => Err(DynaloopError::Config(format!("unknown dummy task '{}'", task)).into()),
        }
    }

    fn obs(&self) -> Fields {
        // Token 0 is padding, 1 and 2 spell the target.
        let token = if self.t <= READ_STEPS {
            self.target + 1
        } else {
            0
        };
        [
            ("token".to_string(), Value::Int(token)),
            (
                "count".to_string(),
                Value::Float(self.t as f32 / LENGTH as f32),
            ),
        ]
        .into_iter()
        .collect()
    }
}

impl Env for DummyEnv {
    fn obs_space(&self) -> Spaces {
        [
            ("token".to_string(), Space::discrete(3)),
            ("count".to_string(), Space::float().bounds(0.0, 1.0)),
        ]
        .into_iter()
        .collect()
    }

    fn act_space(&self) -> Spaces {
        [("action".to_string(), Space::discrete(2))]
            .into_iter()
            .collect()
    }

    fn reset(&mut self) -> Result<Fields> {
        self.t = 0;
        self.target = self.rng.i64(0..2);
        Ok(self.obs())
    }

    fn step(&mut self, act: &Fields) -> Result<EnvStep> {
        let action = match act.get("action") {
            Some(Value::Int(a)) => *a,
            other => {
                return Err(DynaloopError::MalformedTransition(format!(
                    "expected an integer action, got {:?}",
                    other
                ))
                .into())
            }
        };
        self.t += 1;
        let is_read_step = self.t <= READ_STEPS;
        let reward = if !is_read_step && action == self.target {
            1.0
        } else {
            0.0
        };
        let mut info = Record::empty();
        info.insert("target", RecordValue::Scalar(self.target as f32));

        Ok(EnvStep {
            obs: self.obs(),
            reward,
            is_last: self.t >= LENGTH,
            is_terminal: false,
            is_read_step,
            info,
        })
    }
}
