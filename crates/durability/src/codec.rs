//! Versioned encode/decode of `Edit` records (spec §2, "Edit record +
//! codec").
//!
//! Only one wire version exists today; the trait exists so a future change
//! to the `Edit` payload shape can add `EditCodecV2` without touching
//! `txn-manager`, the same way `SnapshotCodec` already supports two
//! versions.

use thiserror::Error;
use txn_core::Edit;

/// Errors from encoding or decoding an `Edit`.
#[derive(Debug, Error)]
pub enum CodecError {
    /// MessagePack deserialization failed.
    #[error("failed to decode edit: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    /// MessagePack serialization failed.
    #[error("failed to encode edit: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// A versioned `Edit` encoder/decoder.
pub trait EditCodec: Send + Sync {
    /// The version byte this codec reads and writes.
    fn version(&self) -> u8;
    /// Encode an `Edit` to bytes.
    fn encode(&self, edit: &Edit) -> Result<Vec<u8>, CodecError>;
    /// Decode an `Edit` from bytes.
    fn decode(&self, bytes: &[u8]) -> Result<Edit, CodecError>;
}

/// MessagePack-based codec, version 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct EditCodecV1;

impl EditCodec for EditCodecV1 {
    fn version(&self) -> u8 {
        1
    }

    fn encode(&self, edit: &Edit) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec(edit)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Edit, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
