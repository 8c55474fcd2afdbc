//! The append-only edit log.
//!
//! - `mode`: whether fsync happens per-group or is skipped entirely
//! - `config`: batching/rotation knobs
//! - `writer`: `LogWriter`, the single-writer-thread append path
//! - `reader`: `LogReader`, the crash-tolerant replay path

mod config;
mod mode;
mod reader;
mod writer;

pub use config::WalConfig;
pub use mode::DurabilityMode;
pub use reader::{LogReader, ReadOutcome, WalError};
pub use writer::LogWriter;
