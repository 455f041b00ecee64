//! Policy.
use super::Spaces;
use crate::transition::{DType, Fields, Value};

/// A policy on an environment.
///
/// Policy is a mapping from an observation to an action.
/// The mapping can be either of deterministic or stochastic.
pub trait Policy {
    /// Sample an action given an observation.
    fn sample(&mut self, obs: &Fields) -> Fields;

    /// Called when a new episode starts.
    fn reset(&mut self) {}
}

/// Samples every action field uniformly within its space.
///
/// Discrete fields draw from `[0, high]`; float fields from `[low, high]`,
/// defaulting to `[-1, 1]`.
pub struct RandomPolicy {
    act_space: Spaces,
    rng: fastrand::Rng,
}

impl RandomPolicy {
    /// Creates a policy for an action space.
    pub fn new(act_space: Spaces, seed: u64) -> Self {
        Self {
            act_space,
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn sample(&mut self, _obs: &Fields) -> Fields {
        let rng = &self.rng;
        self.act_space
            .iter()
            .map(|(k, space)| {
                let low = space.low.unwrap_or(-1.0);
                let high = space.high.unwrap_or(1.0);
                let n = space.shape.iter().product::<usize>();
                let value = match space.dtype {
                    DType::Bool => Value::Bool(rng.bool()),
                    DType::Int if space.shape.is_empty() => {
                        Value::Int(rng.i64(low.max(0.0) as i64..=high as i64))
                    }
                    DType::Int | DType::Float => {
                        let data = (0..n)
                            .map(|_| {
                                let x = low + (high - low) * rng.f64();
                                match space.dtype {
                                    DType::Int => x.round() as f32,
                                    _ => x as f32,
                                }
                            })
                            .collect::<Vec<_>>();
                        if space.shape.is_empty() {
                            Value::Float(data[0])
                        } else {
                            Value::Array {
                                shape: space.shape.clone(),
                                data,
                            }
                        }
                    }
                };
                (k.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::Space;

    #[test]
    fn test_random_policy_respects_space() {
        let mut act_space = Spaces::new();
        act_space.insert("action".to_string(), Space::discrete(3));
        act_space.insert("force".to_string(), Space::array(DType::Float, &[2]).bounds(-0.5, 0.5));
        let mut policy = RandomPolicy::new(act_space.clone(), 42);

        for _ in 0..100 {
            let act = policy.sample(&Fields::new());
            for (k, space) in act_space.iter() {
                let v = act.get(k).unwrap();
                assert!(space.check(v).is_ok(), "{} = {:?}", k, v);
            }
        }
    }
}
