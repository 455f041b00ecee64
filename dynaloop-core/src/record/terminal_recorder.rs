use super::{Record, RecordValue, Recorder};
use anyhow::Result;
use log::info;
use regex::Regex;

/// Writes scalar values of a record as one human readable line.
pub struct TerminalRecorder {
    filter: Option<Regex>,
}

impl TerminalRecorder {
    /// Construct the recorder. `pattern` selects which keys are shown.
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let filter = match pattern {
            Some(p) => Some(Regex::new(p)?),
            None => None,
        };
        Ok(Self { filter })
    }

    fn format(&self, step: u64, record: &Record) -> Option<String> {
        let items = record
            .iter()
            .filter(|(k, _)| self.filter.as_ref().map_or(true, |f| f.is_match(k)))
            .filter_map(|(k, v)| match v {
                RecordValue::Scalar(v) => Some(format!("{} {}", k, format_value(*v))),
                _ => None,
            })
            .collect::<Vec<_>>();
        if items.is_empty() {
            None
        } else {
            Some(format!("[{}] {}", step, items.join(" / ")))
        }
    }
}

fn format_value(v: f32) -> String {
    if v == 0.0 {
        "0".to_string()
    } else if v.abs() >= 1e4 || v.abs() < 1e-3 {
        format!("{:.1e}", v)
    } else {
        format!("{:.4}", v)
    }
}

impl Recorder for TerminalRecorder {
    fn write(&mut self, step: u64, record: &Record) -> Result<()> {
        if let Some(line) = self.format(step, record) {
            info!("{}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() -> Result<()> {
        let r = TerminalRecorder::new(Some("^train/"))?;
        let mut record = Record::from_scalar("train/loss", 0.5);
        record.insert("replay/episodes", RecordValue::Scalar(3.0));
        record.insert("train/name", RecordValue::String("x".to_string()));
        assert_eq!(r.format(4, &record).unwrap(), "[4] train/loss 0.5000");
        assert!(r.format(4, &Record::from_scalar("fps", 1.0)).is_none());
        Ok(())
    }
}
