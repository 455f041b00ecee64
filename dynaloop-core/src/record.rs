//! Types and traits for recording and aggregating training metrics.
//!
//! * [`Record`] - key-value pairs produced by a training step, an episode or a report
//! * [`RecordValue`] - scalar, array or string values of a [`Record`]
//! * [`Metrics`] - accumulates records over many steps and reduces them to a summary
//! * [`Logger`] - collects prefixed records and writes them to every [`Recorder`]
//! * [`Recorder`] - an output sink: terminal, JSON lines, in-memory buffer, etc.
//!
//! ```rust
//! use dynaloop_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("loss", RecordValue::Scalar(0.5));
//! record.insert("obs", RecordValue::Array1(vec![1.0, 2.0]));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
//! ```
mod base;
mod buffered_recorder;
mod jsonl_recorder;
mod logger;
mod metrics;
mod null_recorder;
mod recorder;
mod terminal_recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use jsonl_recorder::JsonlRecorder;
pub use logger::Logger;
pub use metrics::Metrics;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use terminal_recorder::TerminalRecorder;
