use serde::{Deserialize, Serialize};

/// A typed field value of a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),

    /// Integer scalar, e.g. a discrete action or a token id.
    Int(i64),

    /// Floating-point scalar.
    Float(f32),

    /// Dense array in row-major order.
    Array {
        /// Shape of the array.
        shape: Vec<usize>,
        /// Elements, `shape.iter().product()` of them.
        data: Vec<f32>,
    },
}

impl Value {
    /// Creates a 1-dimensional array.
    pub fn vector(data: Vec<f32>) -> Self {
        Self::Array {
            shape: vec![data.len()],
            data,
        }
    }

    /// Shape of the value, empty for scalars.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Array { shape, .. } => shape,
            _ => &[],
        }
    }

    /// Scalar value as `f32`. Arrays return `None`.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Bool(b) => Some(*b as i32 as f32),
            Self::Int(i) => Some(*i as f32),
            Self::Float(f) => Some(*f),
            Self::Array { .. } => None,
        }
    }

    /// All elements as `f32`, a scalar becoming a single element.
    pub fn to_vec(&self) -> Vec<f32> {
        match self {
            Self::Array { data, .. } => data.clone(),
            v => vec![v.as_f32().unwrap_or_default()],
        }
    }

    /// `true` if every element is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Array { data, .. } => data.iter().all(|v| *v == 0.0),
            v => v.as_f32() == Some(0.0),
        }
    }
}
