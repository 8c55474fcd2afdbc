//! Length-prefixed, CRC32-checked physical records, plus the logical
//! `COMMIT_MARKER` / edit framing layered on top of them.

use crc32fast::Hasher;
use thiserror::Error;

/// Magic bytes identifying an edit log file: "TXLG".
pub const LOG_MAGIC: [u8; 4] = *b"TXLG";

/// Legacy log format: no `COMMIT_MARKER`, truncate at first read error.
pub const LOG_FORMAT_VERSION_1: u8 = 1;

/// Current log format: records are grouped behind a `COMMIT_MARKER`.
pub const LOG_FORMAT_VERSION_2: u8 = 2;

/// A decoded physical record was malformed or failed its checksum.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupFramingError {
    /// Fewer bytes were available than the length prefix promised — either
    /// a genuinely truncated file or a torn in-flight write.
    #[error("truncated record: expected {expected} bytes, found {found}")]
    Truncated {
        /// Bytes the length prefix promised.
        expected: usize,
        /// Bytes actually available.
        found: usize,
    },
    /// The trailing CRC32 did not match the payload.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// The logical record tag byte was not recognized.
    #[error("unknown record tag {0}")]
    UnknownTag(u8),
}

/// A single length-prefixed, CRC32-checked physical record.
///
/// Layout: `[len: u32 LE][payload][crc32: u32 LE]`. `len` covers only the
/// payload; the CRC covers the payload bytes.
pub struct RecordFrame;

impl RecordFrame {
    /// Encode `payload` as one physical record.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut hasher = Hasher::new();
        hasher.update(payload);
        let crc = hasher.finalize();

        let mut out = Vec::with_capacity(4 + payload.len() + 4);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Decode one physical record from the front of `buf`.
    ///
    /// Returns the payload and the number of bytes consumed. A `Truncated`
    /// error means the record straddles the end of available bytes — the
    /// caller should treat this as "nothing more to read here", not as
    /// corruption, since it is the expected shape of a crash mid-write.
    pub fn decode(buf: &[u8]) -> Result<(&[u8], usize), GroupFramingError> {
        if buf.len() < 4 {
            return Err(GroupFramingError::Truncated {
                expected: 4,
                found: buf.len(),
            });
        }
        let len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        let total = 4 + len + 4;
        if buf.len() < total {
            return Err(GroupFramingError::Truncated {
                expected: total,
                found: buf.len(),
            });
        }
        let payload = &buf[4..4 + len];
        let stored_crc = u32::from_le_bytes(buf[4 + len..total].try_into().unwrap());

        let mut hasher = Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            return Err(GroupFramingError::ChecksumMismatch);
        }

        Ok((payload, total))
    }
}

/// A logical record within the edit log: either a group's `COMMIT_MARKER`
/// or a sequenced edit payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Marks the start of a group of `count` edit records that were
    /// written (and, for version ≥ 2, fsynced) atomically.
    CommitMarker {
        /// Number of edit records immediately following this marker.
        count: u32,
    },
    /// One durable edit.
    Edit {
        /// Monotonic sequence number, assigned by the writer.
        seq: u64,
        /// Codec-encoded `Edit` bytes (see `crate::codec`).
        bytes: Vec<u8>,
    },
}

const TAG_COMMIT_MARKER: u8 = 0;
const TAG_EDIT: u8 = 1;

impl LogRecord {
    /// Encode this logical record as a physical record's payload.
    pub fn to_payload(&self) -> Vec<u8> {
        match self {
            LogRecord::CommitMarker { count } => {
                let mut out = Vec::with_capacity(5);
                out.push(TAG_COMMIT_MARKER);
                out.extend_from_slice(&count.to_le_bytes());
                out
            }
            LogRecord::Edit { seq, bytes } => {
                let mut out = Vec::with_capacity(9 + bytes.len());
                out.push(TAG_EDIT);
                out.extend_from_slice(&seq.to_le_bytes());
                out.extend_from_slice(bytes);
                out
            }
        }
    }

    /// Decode a logical record from a physical record's payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, GroupFramingError> {
        let tag = *payload
            .first()
            .ok_or(GroupFramingError::Truncated { expected: 1, found: 0 })?;
        match tag {
            TAG_COMMIT_MARKER => {
                if payload.len() < 5 {
                    return Err(GroupFramingError::Truncated {
                        expected: 5,
                        found: payload.len(),
                    });
                }
                let count = u32::from_le_bytes(payload[1..5].try_into().unwrap());
                Ok(LogRecord::CommitMarker { count })
            }
            TAG_EDIT => {
                if payload.len() < 9 {
                    return Err(GroupFramingError::Truncated {
                        expected: 9,
                        found: payload.len(),
                    });
                }
                let seq = u64::from_le_bytes(payload[1..9].try_into().unwrap());
                Ok(LogRecord::Edit {
                    seq,
                    bytes: payload[9..].to_vec(),
                })
            }
            other => Err(GroupFramingError::UnknownTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_frame_roundtrips() {
        let payload = b"hello world";
        let encoded = RecordFrame::encode(payload);
        let (decoded, consumed) = RecordFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn record_frame_detects_truncation() {
        let payload = b"hello world";
        let mut encoded = RecordFrame::encode(payload);
        encoded.truncate(encoded.len() - 2);
        assert!(matches!(
            RecordFrame::decode(&encoded),
            Err(GroupFramingError::Truncated { .. })
        ));
    }

    #[test]
    fn record_frame_detects_checksum_mismatch() {
        let payload = b"hello world";
        let mut encoded = RecordFrame::encode(payload);
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert_eq!(
            RecordFrame::decode(&encoded),
            Err(GroupFramingError::ChecksumMismatch)
        );
    }

    #[test]
    fn logical_record_roundtrips() {
        let marker = LogRecord::CommitMarker { count: 5 };
        let payload = marker.to_payload();
        assert_eq!(LogRecord::from_payload(&payload).unwrap(), marker);

        let edit = LogRecord::Edit {
            seq: 42,
            bytes: vec![1, 2, 3],
        };
        let payload = edit.to_payload();
        assert_eq!(LogRecord::from_payload(&payload).unwrap(), edit);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(
            LogRecord::from_payload(&[0xFF]),
            Err(GroupFramingError::UnknownTag(0xFF))
        );
    }
}
