//! Base implementation of records for logging.
use crate::error::DynaloopError;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{
    btree_map::{IntoIter, Iter, Keys},
    BTreeMap,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like loss.
    Scalar(f32),

    /// A 1-dimensional array of floating-point values.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

impl RecordValue {
    fn to_json(&self) -> JsonValue {
        match self {
            Self::Scalar(v) => json!(v),
            Self::Array1(v) => json!(v),
            Self::String(s) => json!(s),
        }
    }
}

/// A container of key-value pairs, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(BTreeMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        let mut record = Self::empty();
        record.insert(name, RecordValue::Scalar(value));
        record
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns an iterator that consumes the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// `true` if the key exists.
    pub fn contains_key(&self, k: &str) -> bool {
        self.0.contains_key(k)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges two records, consuming both.
    ///
    /// If both records contain the same key, the value from the second record
    /// will overwrite the value from the first record.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place, overwriting existing keys.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Returns the record with every key prefixed by `prefix/`.
    ///
    /// An empty prefix leaves keys unchanged.
    pub fn with_prefix(self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        Record(
            self.0
                .into_iter()
                .map(|(k, v)| (format!("{}/{}", prefix, k), v))
                .collect(),
        )
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, DynaloopError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(DynaloopError::RecordValueTypeError("Scalar".to_string())),
            None => Err(DynaloopError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array from the record.
    ///
    /// # Errors
    ///
    /// [`DynaloopError::RecordKeyError`] if the key does not exist,
    /// [`DynaloopError::RecordValueTypeError`] if the value is not an array.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, DynaloopError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(DynaloopError::RecordValueTypeError("Array1".to_string())),
            None => Err(DynaloopError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value from the record.
    pub fn get_string(&self, k: &str) -> Result<String, DynaloopError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(DynaloopError::RecordValueTypeError("String".to_string())),
            None => Err(DynaloopError::RecordKeyError(k.to_string())),
        }
    }

    /// Converts the record into a JSON object.
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<Map<_, _>>();
        JsonValue::Object(map)
    }
}

impl FromIterator<(String, RecordValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, RecordValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_prefix() {
        let a = Record::from_scalar("loss", 1.0);
        let b = Record::from_slice(&[
            ("loss", RecordValue::Scalar(2.0)),
            ("name", RecordValue::String("x".to_string())),
        ]);
        let merged = a.merge(b).with_prefix("train");
        assert_eq!(merged.get_scalar("train/loss").unwrap(), 2.0);
        assert_eq!(merged.get_string("train/name").unwrap(), "x");
        assert!(matches!(
            merged.get_scalar("train/name"),
            Err(DynaloopError::RecordValueTypeError(_))
        ));
        assert!(matches!(
            merged.get_scalar("loss"),
            Err(DynaloopError::RecordKeyError(_))
        ));
    }

    #[test]
    fn test_to_json() {
        let mut record = Record::from_scalar("a", 0.5);
        record.insert("b", RecordValue::Array1(vec![1.0, 2.0]));
        assert_eq!(record.to_json(), json!({"a": 0.5, "b": [1.0, 2.0]}));
    }

    #[test]
    fn test_get_array1() {
        let mut record = Record::from_scalar("a", 0.5);
        record.insert("b", RecordValue::Array1(vec![1.0, 2.0]));
        assert_eq!(record.get_array1("b").unwrap(), vec![1.0, 2.0]);
        assert!(matches!(
            record.get_array1("a"),
            Err(DynaloopError::RecordValueTypeError(_))
        ));
        assert!(matches!(
            record.get_array1("c"),
            Err(DynaloopError::RecordKeyError(_))
        ));
    }
}
