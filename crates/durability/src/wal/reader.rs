//! `LogReader`: crash-tolerant replay of a single edit log segment.

use crate::codec::{CodecError, EditCodec};
use crate::format::{GroupFramingError, LogRecord, RecordFrame, LOG_FORMAT_VERSION_1, LOG_FORMAT_VERSION_2, LOG_MAGIC};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use txn_core::Edit;

/// Errors reading the edit log.
#[derive(Debug, Error)]
pub enum WalError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The segment header's magic bytes or version were unrecognized.
    #[error("invalid segment header: {0}")]
    InvalidHeader(String),
    /// An `Edit` payload failed to decode even though its frame checksum
    /// was valid — a genuine corruption, not a torn tail.
    #[error("edit codec error: {0}")]
    Codec(#[from] CodecError),
}

/// The outcome of reading one segment file to the end.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Edits recovered from complete, checksum-valid groups, in the order
    /// they were written.
    pub edits: Vec<Edit>,
    /// Highest sequence number seen (version ≥ 2 segments only). `None`
    /// for an empty or version-1 segment.
    pub max_seq: Option<u64>,
    /// Whether a torn tail was discarded (a partial group or a mid-record
    /// truncation). `false` means the segment ended exactly on a group
    /// boundary.
    pub torn_tail_discarded: bool,
}

/// Reads a single log segment file.
pub struct LogReader {
    codec: Arc<dyn EditCodec>,
}

impl LogReader {
    /// Build a reader using the given edit codec.
    pub fn new(codec: Arc<dyn EditCodec>) -> Self {
        LogReader { codec }
    }

    /// Read `path` to the end, stopping cleanly at the first torn or
    /// corrupt record (spec §6).
    pub fn read_segment(&self, path: &Path) -> Result<ReadOutcome, WalError> {
        let bytes = std::fs::read(path)?;
        self.read_bytes(&bytes)
    }

    /// Read an already-loaded buffer (exposed for tests that synthesize
    /// corruption without touching the filesystem).
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<ReadOutcome, WalError> {
        if bytes.len() < 5 || bytes[0..4] != LOG_MAGIC {
            return Err(WalError::InvalidHeader(
                "missing or invalid magic bytes".into(),
            ));
        }
        let version = bytes[4];
        let body = &bytes[5..];

        match version {
            LOG_FORMAT_VERSION_1 => self.read_legacy(body),
            LOG_FORMAT_VERSION_2 => self.read_grouped(body),
            other => Err(WalError::InvalidHeader(format!(
                "unsupported log format version {other}"
            ))),
        }
    }

    /// Version-1: a flat sequence of physical records, each an edit
    /// payload directly (no `COMMIT_MARKER`, no sequence numbers).
    /// Truncates at the first decode error.
    fn read_legacy(&self, mut body: &[u8]) -> Result<ReadOutcome, WalError> {
        let mut edits = Vec::new();
        let mut torn = false;

        while !body.is_empty() {
            match RecordFrame::decode(body) {
                Ok((payload, consumed)) => {
                    let edit = self.codec.decode(payload)?;
                    edits.push(edit);
                    body = &body[consumed..];
                }
                Err(_) => {
                    torn = !body.is_empty();
                    break;
                }
            }
        }

        Ok(ReadOutcome {
            edits,
            max_seq: None,
            torn_tail_discarded: torn,
        })
    }

    /// Version-2+: groups of a `COMMIT_MARKER` followed by `count` edit
    /// records. A group that doesn't fully materialize is discarded.
    fn read_grouped(&self, mut body: &[u8]) -> Result<ReadOutcome, WalError> {
        let mut edits = Vec::new();
        let mut max_seq = None;
        let mut torn = false;

        'outer: while !body.is_empty() {
            let (marker_payload, consumed) = match RecordFrame::decode(body) {
                Ok(ok) => ok,
                Err(_) => {
                    torn = true;
                    break;
                }
            };
            let count = match LogRecord::from_payload(marker_payload) {
                Ok(LogRecord::CommitMarker { count }) => count,
                Ok(LogRecord::Edit { .. }) | Err(_) => {
                    // Not a marker where one was expected: treat the whole
                    // remainder as an undecodable tail and stop.
                    torn = true;
                    break;
                }
            };
            body = &body[consumed..];

            let mut group_edits = Vec::with_capacity(count as usize);
            let mut group_max_seq = max_seq;
            for _ in 0..count {
                let (payload, consumed) = match RecordFrame::decode(body) {
                    Ok(ok) => ok,
                    Err(_) => {
                        // Fewer than `count` records present: torn tail.
                        // Discard this whole group, even the records we
                        // did manage to read.
                        torn = true;
                        break 'outer;
                    }
                };
                match LogRecord::from_payload(payload)? {
                    LogRecord::Edit { seq, bytes } => {
                        group_edits.push(self.codec.decode(&bytes)?);
                        group_max_seq = Some(group_max_seq.map_or(seq, |m: u64| m.max(seq)));
                    }
                    LogRecord::CommitMarker { .. } => {
                        torn = true;
                        break 'outer;
                    }
                }
                body = &body[consumed..];
            }

            edits.extend(group_edits);
            max_seq = group_max_seq;
        }

        Ok(ReadOutcome {
            edits,
            max_seq,
            torn_tail_discarded: torn,
        })
    }
}

impl From<GroupFramingError> for WalError {
    fn from(e: GroupFramingError) -> Self {
        WalError::InvalidHeader(e.to_string())
    }
}
