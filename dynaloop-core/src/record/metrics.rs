//! Accumulation and reduction of metrics over many training steps.
use super::{Record, RecordValue};
use std::collections::BTreeMap;

/// Accumulates records and reduces them per key.
///
/// Repeated keys are collected, not overwritten. [`Metrics::result`] reduces
/// them and clears the accumulator, so every reporting interval starts fresh:
///
/// * scalars are averaged,
/// * arrays are averaged elementwise when all observations share a length,
///   otherwise the most recent one is kept,
/// * strings keep the most recent value.
#[derive(Debug, Default)]
pub struct Metrics {
    data: BTreeMap<String, Vec<RecordValue>>,
}

fn mean(vs: &[f32]) -> f32 {
    (vs.iter().map(|v| *v as f64).sum::<f64>() / vs.len() as f64) as f32
}

fn reduce(values: Vec<RecordValue>) -> Option<RecordValue> {
    let last = values.last()?.clone();
    match last {
        RecordValue::Scalar(_) => {
            let vs = values
                .iter()
                .filter_map(|v| match v {
                    RecordValue::Scalar(v) => Some(*v),
                    _ => None,
                })
                .collect::<Vec<_>>();
            Some(RecordValue::Scalar(mean(&vs)))
        }
        RecordValue::Array1(ref a) => {
            let n = a.len();
            let arrays = values
                .iter()
                .filter_map(|v| match v {
                    RecordValue::Array1(v) if v.len() == n => Some(v),
                    _ => None,
                })
                .collect::<Vec<_>>();
            if arrays.len() != values.len() {
                return Some(last);
            }
            let m = (0..n)
                .map(|i| mean(&arrays.iter().map(|a| a[i]).collect::<Vec<_>>()))
                .collect();
            Some(RecordValue::Array1(m))
        }
        RecordValue::String(_) => Some(last),
    }
}

impl Metrics {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records all values of `record` under `prefix/`.
    pub fn add(&mut self, record: Record, prefix: &str) {
        for (k, v) in record.with_prefix(prefix).into_iter_in_record() {
            self.data.entry(k).or_default().push(v);
        }
    }

    /// Records a single scalar.
    pub fn scalar(&mut self, key: impl Into<String>, value: f32) {
        self.data
            .entry(key.into())
            .or_default()
            .push(RecordValue::Scalar(value));
    }

    /// `true` if nothing was added since the last [`Metrics::result`].
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reduces the accumulated values and clears the accumulator.
    pub fn result(&mut self) -> Record {
        std::mem::take(&mut self.data)
            .into_iter()
            .filter_map(|(k, vs)| reduce(vs).map(|v| (k, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_reset() {
        let mut metrics = Metrics::new();
        for loss in [1.0, 2.0, 6.0] {
            metrics.add(Record::from_scalar("loss", loss), "train");
        }
        metrics.add(
            Record::from_slice(&[("name", RecordValue::String("a".to_string()))]),
            "",
        );
        metrics.add(
            Record::from_slice(&[("name", RecordValue::String("b".to_string()))]),
            "",
        );

        let result = metrics.result();
        assert_eq!(result.get_scalar("train/loss").unwrap(), 3.0);
        assert_eq!(result.get_string("name").unwrap(), "b");
        assert!(metrics.is_empty());
        assert!(metrics.result().is_empty());
    }

    #[test]
    fn test_arrays() {
        let mut metrics = Metrics::new();
        metrics.add(Record::from_slice(&[("a", RecordValue::Array1(vec![1.0, 2.0]))]), "");
        metrics.add(Record::from_slice(&[("a", RecordValue::Array1(vec![3.0, 4.0]))]), "");
        metrics.add(Record::from_slice(&[("b", RecordValue::Array1(vec![1.0]))]), "");
        metrics.add(Record::from_slice(&[("b", RecordValue::Array1(vec![1.0, 5.0]))]), "");
        let result = metrics.result();
        assert_eq!(result.get_array1("a").unwrap(), vec![2.0, 3.0]);
        assert_eq!(result.get_array1("b").unwrap(), vec![1.0, 5.0]);
    }
}
