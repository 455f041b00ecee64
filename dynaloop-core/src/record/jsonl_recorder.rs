use super::{Record, Recorder};
use anyhow::Result;
use regex::Regex;
use serde_json::{json, Value};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Appends one JSON object per write to a newline-delimited file.
///
/// With a filter, only keys matching the regex are written and writes without
/// any matching key are skipped.
pub struct JsonlRecorder {
    path: PathBuf,
    filter: Option<Regex>,
    writer: BufWriter<File>,
}

impl JsonlRecorder {
    /// Opens `dir/filename` for appending, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>, filename: &str) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(filename);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            filter: None,
            writer: BufWriter::new(file),
        })
    }

    /// Keeps only keys matching `pattern`.
    pub fn with_filter(mut self, pattern: &str) -> Result<Self> {
        self.filter = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Recorder for JsonlRecorder {
    fn write(&mut self, step: u64, record: &Record) -> Result<()> {
        let mut obj = match record.to_json() {
            Value::Object(obj) => obj,
            v => anyhow::bail!("Record is not a JSON object: {}", v),
        };
        if let Some(filter) = &self.filter {
            obj.retain(|k, _| filter.is_match(k));
            if obj.is_empty() {
                return Ok(());
            }
        }
        obj.insert("step".to_string(), json!(step));
        serde_json::to_writer(&mut self.writer, &obj)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
