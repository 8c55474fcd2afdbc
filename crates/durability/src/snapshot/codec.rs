//! Versioned snapshot body codec, with a tail-corruption-tolerant
//! visibility-only decode mode (spec §4.3).
//!
//! Every version's body is framed the same way so `decode_visibility` can
//! be generic over the schema: `[visibility_len: u32 LE][visibility
//! bytes][tail bytes]`. Only the first segment is touched by
//! `decode_visibility`; a corrupted tail never prevents a visibility-only
//! read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use txn_core::ids::TxId;
use txn_core::snapshot::{TransactionSnapshot, VisibilityState};
use txn_core::transaction::{InProgressTx, TxType};
use txn_core::ChangeId;

/// Magic bytes identifying a snapshot file: "TXSN".
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"TXSN";

/// Errors encoding or decoding a snapshot body.
#[derive(Debug, Error)]
pub enum SnapshotCodecError {
    /// MessagePack serialization failed.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    /// MessagePack deserialization failed.
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    /// The body was shorter than its own length prefix claimed.
    #[error("truncated snapshot body")]
    Truncated,
}

/// A versioned snapshot body encoder/decoder.
pub trait SnapshotCodec: Send + Sync {
    /// The version byte this codec reads and writes.
    fn version(&self) -> u8;
    /// Encode the full snapshot.
    fn encode(&self, snapshot: &TransactionSnapshot) -> Result<Vec<u8>, SnapshotCodecError>;
    /// Decode the full snapshot, including committing/committed change
    /// sets.
    fn decode(&self, body: &[u8]) -> Result<TransactionSnapshot, SnapshotCodecError>;
    /// Decode only the visibility prefix. Must succeed even if the bytes
    /// following the visibility segment are corrupt.
    fn decode_visibility(&self, body: &[u8]) -> Result<VisibilityState, SnapshotCodecError>;
}

fn split_prefixed(body: &[u8]) -> Result<(&[u8], &[u8]), SnapshotCodecError> {
    if body.len() < 4 {
        return Err(SnapshotCodecError::Truncated);
    }
    let len = u32::from_le_bytes(body[0..4].try_into().unwrap()) as usize;
    if body.len() < 4 + len {
        return Err(SnapshotCodecError::Truncated);
    }
    Ok((&body[4..4 + len], &body[4 + len..]))
}

fn frame_prefixed(visibility_bytes: &[u8], tail_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + visibility_bytes.len() + tail_bytes.len());
    out.extend_from_slice(&(visibility_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(visibility_bytes);
    out.extend_from_slice(tail_bytes);
    out
}

/// Current snapshot codec: full fidelity, explicit `InProgressType`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotCodecV2;

impl SnapshotCodec for SnapshotCodecV2 {
    fn version(&self) -> u8 {
        2
    }

    fn encode(&self, snapshot: &TransactionSnapshot) -> Result<Vec<u8>, SnapshotCodecError> {
        let visibility_bytes = rmp_serde::to_vec(&snapshot.visibility)?;
        let tail = (
            &snapshot.committing_change_sets,
            &snapshot.committed_change_sets,
        );
        let tail_bytes = rmp_serde::to_vec(&tail)?;
        Ok(frame_prefixed(&visibility_bytes, &tail_bytes))
    }

    fn decode(&self, body: &[u8]) -> Result<TransactionSnapshot, SnapshotCodecError> {
        let (visibility_bytes, tail_bytes) = split_prefixed(body)?;
        let visibility: VisibilityState = rmp_serde::from_slice(visibility_bytes)?;
        let (committing_change_sets, committed_change_sets): (
            BTreeMap<TxId, Vec<ChangeId>>,
            BTreeMap<TxId, Vec<ChangeId>>,
        ) = rmp_serde::from_slice(tail_bytes)?;
        Ok(TransactionSnapshot {
            visibility,
            committing_change_sets,
            committed_change_sets,
        })
    }

    fn decode_visibility(&self, body: &[u8]) -> Result<VisibilityState, SnapshotCodecError> {
        let (visibility_bytes, _tail_bytes) = split_prefixed(body)?;
        Ok(rmp_serde::from_slice(visibility_bytes)?)
    }
}

// --- Legacy (v1) schema --------------------------------------------------
//
// Snapshots written by very early codecs omit `InProgressType` entirely;
// an in-progress entry with `expiration == -1` is reinterpreted as LONG,
// everything else as SHORT (spec §4.3 back-compat fixup).

#[derive(Debug, Serialize, Deserialize)]
struct LegacyInProgressEntry {
    visibility_upper_bound: u64,
    /// `-1` means "no expiration" (what v2 calls LONG).
    expiration: i64,
    checkpoint_write_pointers: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LegacyVisibility {
    timestamp_millis: u64,
    read_pointer: u64,
    write_pointer: u64,
    in_progress: BTreeMap<u64, LegacyInProgressEntry>,
    invalid: Vec<u64>,
}

/// A default SHORT timeout (milliseconds) used to rewrite a legacy entry's
/// expiration when it can't be inferred from the stored `-1` sentinel.
/// Mirrors `ManagerConfig::with_snapshot_dir`'s default
/// `tx_timeout_default_seconds`.
const LEGACY_DEFAULT_TIMEOUT_MILLIS: u64 = 30_000;

/// Legacy snapshot codec (no `InProgressType`, pre-`COMMIT_MARKER` era).
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotCodecV1;

impl SnapshotCodec for SnapshotCodecV1 {
    fn version(&self) -> u8 {
        1
    }

    fn encode(&self, snapshot: &TransactionSnapshot) -> Result<Vec<u8>, SnapshotCodecError> {
        // Producers always write the latest version (spec §6); V1 encoding
        // exists only to decode legacy fixtures in tests and during
        // recovery of old snapshot files.
        let legacy = LegacyVisibility {
            timestamp_millis: snapshot.visibility.timestamp_millis,
            read_pointer: snapshot.visibility.read_pointer.raw(),
            write_pointer: snapshot.visibility.write_pointer.raw(),
            in_progress: snapshot
                .visibility
                .in_progress
                .iter()
                .map(|(id, entry)| {
                    (
                        id.raw(),
                        LegacyInProgressEntry {
                            visibility_upper_bound: entry.visibility_upper_bound.raw(),
                            expiration: entry.expiration.map(|e| e as i64).unwrap_or(-1),
                            checkpoint_write_pointers: entry
                                .checkpoint_write_pointers
                                .iter()
                                .map(|p| p.raw())
                                .collect(),
                        },
                    )
                })
                .collect(),
            invalid: snapshot.visibility.invalid.iter().map(|id| id.raw()).collect(),
        };
        let visibility_bytes = rmp_serde::to_vec(&legacy)?;
        Ok(frame_prefixed(&visibility_bytes, &[]))
    }

    fn decode(&self, body: &[u8]) -> Result<TransactionSnapshot, SnapshotCodecError> {
        Ok(TransactionSnapshot {
            visibility: self.decode_visibility(body)?,
            committing_change_sets: BTreeMap::new(),
            committed_change_sets: BTreeMap::new(),
        })
    }

    fn decode_visibility(&self, body: &[u8]) -> Result<VisibilityState, SnapshotCodecError> {
        let (visibility_bytes, _tail_bytes) = split_prefixed(body)?;
        let legacy: LegacyVisibility = rmp_serde::from_slice(visibility_bytes)?;

        let in_progress = legacy
            .in_progress
            .into_iter()
            .map(|(raw_id, entry)| {
                let (tx_type, expiration) = if entry.expiration == -1 {
                    (TxType::Long, None)
                } else if entry.expiration == 0 {
                    // Unset: rewrite from the id's own timestamp plus the
                    // default SHORT timeout, per the back-compat fixup.
                    let id = TxId::new(raw_id);
                    (
                        TxType::Short,
                        Some(id.timestamp_millis() + LEGACY_DEFAULT_TIMEOUT_MILLIS),
                    )
                } else {
                    (TxType::Short, Some(entry.expiration as u64))
                };
                (
                    TxId::new(raw_id),
                    InProgressTx {
                        visibility_upper_bound: TxId::new(entry.visibility_upper_bound),
                        expiration,
                        tx_type,
                        checkpoint_write_pointers: entry
                            .checkpoint_write_pointers
                            .into_iter()
                            .map(TxId::new)
                            .collect(),
                    },
                )
            })
            .collect();

        Ok(VisibilityState {
            timestamp_millis: legacy.timestamp_millis,
            read_pointer: TxId::new(legacy.read_pointer),
            write_pointer: TxId::new(legacy.write_pointer),
            in_progress,
            invalid: legacy.invalid.into_iter().map(TxId::new).collect(),
        })
    }
}
