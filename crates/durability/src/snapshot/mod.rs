//! Periodic full-state snapshots (spec §4.3, §6).
//!
//! A snapshot file is `[magic(4)][version(1)][body]`, where `body` is
//! produced by whichever `SnapshotCodec` matches `version`. The codec
//! additionally exposes `decode_visibility`, which reads only the
//! visibility prefix and tolerates corruption in the tail — this is what
//! lets a read-only follower hydrate without the committing/committed
//! maps (spec §4.3).

mod codec;
mod io;

pub use codec::{
    SnapshotCodec, SnapshotCodecError, SnapshotCodecV1, SnapshotCodecV2, SNAPSHOT_MAGIC,
};
pub use io::{snapshot_file_name, SnapshotIoError, SnapshotReader, SnapshotWriter};
