//! On-disk byte layout for the edit log and snapshot files (spec §6).
//!
//! ```text
//! [magic(4)][version(1)]
//!   repeated {
//!     commit-marker { type = COMMIT_MARKER, count = n }
//!     n records: { seq: u64, edit: codec(version)-encoded }
//!   }
//! ```
//!
//! Version-1 logs omit the `COMMIT_MARKER` and are read as a flat sequence
//! of records, truncating cleanly at the first decode error. Version-2+
//! logs group records behind a marker so the reader can tell a genuine
//! torn tail (fewer than `n` records present) from a clean end of file.

mod record;

pub use record::{
    GroupFramingError, LogRecord, RecordFrame, LOG_FORMAT_VERSION_1, LOG_FORMAT_VERSION_2,
    LOG_MAGIC,
};
