//! Durability subsystem for the transaction coordinator.
//!
//! This crate owns everything that touches disk:
//!
//! - `format`: on-disk byte layout for WAL segments (magic, version,
//!   length-prefixed CRC32'd records, `COMMIT_MARKER` group framing) and
//!   for snapshot files (header + versioned body).
//! - `codec`: versioned encode/decode of `Edit` records and
//!   `TransactionSnapshot`s, selected by a version byte read from the
//!   stream, including the tolerant visibility-prefix-only decode mode.
//! - `wal`: the append-only edit log — `LogWriter` (group commit, one
//!   `fsync` per group) and `LogReader` (crash-tolerant, discards a torn
//!   tail cleanly).
//! - `snapshot`: periodic full-state dump — `SnapshotWriter` (temp file,
//!   fsync, atomic rename) and `SnapshotReader`.
//! - `storage`: `StateStorage`, which coordinates snapshot files and log
//!   segments under a configured directory — enumeration, retention,
//!   latest-snapshot lookup, and the recovery iterator.
//!
//! None of this crate interprets *what* an edit does to manager state;
//! that state machine lives in `txn-manager`, which calls back into this
//! crate only for bytes and file placement.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod format;
pub mod snapshot;
pub mod storage;
pub mod wal;

pub use codec::{CodecError, EditCodec, EditCodecV1};
pub use snapshot::{
    SnapshotCodec, SnapshotCodecError, SnapshotCodecV1, SnapshotCodecV2, SnapshotIoError,
    SnapshotReader, SnapshotWriter,
};
pub use storage::{RecoveryPlan, StateStorage, StateStorageError};
pub use wal::{LogReader, LogWriter, WalError};

/// Current wall-clock time in epoch milliseconds.
///
/// Centralized so tests can see exactly where the manager reads the clock;
/// matches the teacher's habit of a single `now_micros`/`now_millis` free
/// function rather than scattering `SystemTime::now()` calls.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as u64
}
