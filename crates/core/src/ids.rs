//! Transaction identifiers and the raw-byte change id.
//!
//! Identifiers are derived from `currentTimeMillis * MAX_TX_PER_MS +
//! sequence` (spec §3), which keeps them monotonic, time-ordered, and
//! comparable across a restart as long as the clock doesn't move backwards
//! further than the manager tolerates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on transactions allocated within a single millisecond.
///
/// Must be stable across runs of the same log (spec §6,
/// `tx.max.per.ms`) — changing it reinterprets every id already on disk.
pub const MAX_TX_PER_MS: u64 = 1_000_000;

/// A 64-bit, monotonically increasing transaction identifier.
///
/// `TxId` is a thin wrapper rather than a bare `u64` so that ids and plain
/// counts can't be mixed up at a call site by accident.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(u64);

impl TxId {
    /// Wrap a raw id. Callers outside the manager should treat this as an
    /// opaque value; only `advance_write_pointer` mints new ones.
    pub const fn new(raw: u64) -> Self {
        TxId(raw)
    }

    /// The raw id, for logging and wire encoding.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The millisecond-timestamp prefix this id was allocated under.
    pub const fn timestamp_millis(self) -> u64 {
        self.0 / MAX_TX_PER_MS
    }

    /// First id that could be allocated at the given millisecond.
    pub const fn first_at(timestamp_millis: u64) -> Self {
        TxId(timestamp_millis * MAX_TX_PER_MS)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque byte-string identifying a row/key a transaction touched.
///
/// Equality and hashing are on the raw bytes (spec §3); the manager never
/// interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeId(Vec<u8>);

impl ChangeId {
    /// Wrap raw bytes as a change id.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        ChangeId(bytes.into())
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for ChangeId {
    fn from(bytes: &[u8]) -> Self {
        ChangeId(bytes.to_vec())
    }
}

impl From<Vec<u8>> for ChangeId {
    fn from(bytes: Vec<u8>) -> Self {
        ChangeId(bytes)
    }
}
