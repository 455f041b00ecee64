use super::{Transition, Value, IS_FIRST, IS_LAST, IS_READ_STEP, IS_TERMINAL, REWARD};
use crate::error::DynaloopError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Element type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    /// Boolean flag, always a scalar.
    Bool,
    /// Integral values.
    Int,
    /// Floating-point values.
    Float,
}

/// Declared dtype, shape and bounds of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    /// Element type.
    pub dtype: DType,

    /// Shape, empty for scalars.
    pub shape: Vec<usize>,

    /// Inclusive lower bound of every element.
    pub low: Option<f64>,

    /// Inclusive upper bound of every element.
    pub high: Option<f64>,
}

impl Space {
    /// A boolean scalar.
    pub fn bool() -> Self {
        Self {
            dtype: DType::Bool,
            shape: vec![],
            low: None,
            high: None,
        }
    }

    /// An unbounded integer scalar.
    pub fn int() -> Self {
        Self {
            dtype: DType::Int,
            shape: vec![],
            low: None,
            high: None,
        }
    }

    /// A discrete choice among `n` values, `0..n`.
    pub fn discrete(n: usize) -> Self {
        Self::int().bounds(0.0, n.saturating_sub(1) as f64)
    }

    /// An unbounded float scalar.
    pub fn float() -> Self {
        Self {
            dtype: DType::Float,
            shape: vec![],
            low: None,
            high: None,
        }
    }

    /// An array of the given dtype and shape.
    pub fn array(dtype: DType, shape: &[usize]) -> Self {
        Self {
            dtype,
            shape: shape.to_vec(),
            low: None,
            high: None,
        }
    }

    /// Sets inclusive bounds.
    pub fn bounds(mut self, low: f64, high: f64) -> Self {
        self.low = Some(low);
        self.high = Some(high);
        self
    }

    /// `true` for discrete spaces.
    pub fn is_discrete(&self) -> bool {
        self.dtype == DType::Int && self.shape.is_empty()
    }

    /// Infers an unbounded space from a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::bool(),
            Value::Int(_) => Self::int(),
            Value::Float(_) => Self::float(),
            Value::Array { shape, .. } => Self::array(DType::Float, shape),
        }
    }

    /// Checks that `value` belongs to this space.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self.dtype, value) {
            (DType::Bool, Value::Bool(_)) if self.shape.is_empty() => return Ok(()),
            (DType::Int, Value::Int(_)) | (DType::Float, Value::Float(_))
                if self.shape.is_empty() => {}
            (DType::Int, Value::Array { shape, data }) | (DType::Float, Value::Array { shape, data })
                if shape == &self.shape =>
            {
                if data.len() != shape.iter().product::<usize>() {
                    return Err(format!(
                        "array has {} elements but shape {:?}",
                        data.len(),
                        shape
                    ));
                }
                if self.dtype == DType::Int && data.iter().any(|v| v.fract() != 0.0) {
                    return Err("expected integral elements".to_string());
                }
            }
            _ => {
                return Err(format!(
                    "expected {:?} with shape {:?}, got {:?}",
                    self.dtype,
                    self.shape,
                    value_kind(value)
                ));
            }
        }

        let out_of_bounds = value.to_vec().into_iter().any(|v| {
            let v = v as f64;
            self.low.map_or(false, |low| !(v >= low)) || self.high.map_or(false, |high| !(v <= high))
        });
        if out_of_bounds {
            return Err(format!("value out of bounds [{:?}, {:?}]", self.low, self.high));
        }
        Ok(())
    }
}

fn value_kind(value: &Value) -> String {
    match value {
        Value::Bool(_) => "Bool".to_string(),
        Value::Int(_) => "Int".to_string(),
        Value::Float(_) => "Float".to_string(),
        Value::Array { shape, .. } => format!("Array{:?}", shape),
    }
}

/// Field-to-space table that every transition of a buffer must match.
///
/// `reward`, `is_first`, `is_last` and `is_terminal` are always part of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema(BTreeMap<String, Space>);

impl Default for Schema {
    fn default() -> Self {
        let mut spaces = BTreeMap::new();
        spaces.insert(REWARD.to_string(), Space::float());
        spaces.insert(IS_FIRST.to_string(), Space::bool());
        spaces.insert(IS_LAST.to_string(), Space::bool());
        spaces.insert(IS_TERMINAL.to_string(), Space::bool());
        Self(spaces)
    }
}

impl Schema {
    /// Schema with the required fields only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    pub fn field(mut self, name: impl Into<String>, space: Space) -> Self {
        self.0.insert(name.into(), space);
        self
    }

    /// Adds all fields of another table, e.g. observation and action spaces.
    pub fn extend<'a>(mut self, spaces: impl IntoIterator<Item = (&'a String, &'a Space)>) -> Self {
        for (k, v) in spaces {
            self.0.insert(k.clone(), v.clone());
        }
        self
    }

    /// Infers a schema from a transition. Required fields keep their
    /// declared spaces and `is_read_step` stays optional.
    pub fn infer(tran: &Transition) -> Self {
        let mut schema = Self::default();
        for (k, v) in tran.iter().filter(|(k, _)| k.as_str() != IS_READ_STEP) {
            schema.0.entry(k.clone()).or_insert_with(|| Space::of(v));
        }
        schema
    }

    /// Gets the space of a field.
    pub fn get(&self, name: &str) -> Option<&Space> {
        self.0.get(name)
    }

    /// Iterates over fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Space)> {
        self.0.iter()
    }

    /// Checks field set, dtypes, shapes and bounds of a transition.
    ///
    /// `is_read_step` may be present or absent on any transition.
    pub fn validate(&self, tran: &Transition) -> Result<(), DynaloopError> {
        if let Some(v) = tran.get(IS_READ_STEP) {
            if !matches!(v, Value::Bool(_)) {
                return Err(DynaloopError::MalformedTransition(format!(
                    "field '{}' must be a bool",
                    IS_READ_STEP
                )));
            }
        }
        for (name, space) in self.0.iter().filter(|(k, _)| k.as_str() != IS_READ_STEP) {
            let value = tran.get(name).ok_or_else(|| {
                DynaloopError::MalformedTransition(format!("missing field '{}'", name))
            })?;
            space.check(value).map_err(|e| {
                DynaloopError::MalformedTransition(format!("field '{}': {}", name, e))
            })?;
        }
        if let Some(extra) = tran
            .keys()
            .find(|k| k.as_str() != IS_READ_STEP && !self.0.contains_key(*k))
        {
            return Err(DynaloopError::MalformedTransition(format!(
                "unexpected field '{}'",
                extra
            )));
        }
        Ok(())
    }
}
