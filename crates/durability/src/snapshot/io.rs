//! Atomic snapshot file I/O: `SnapshotWriter` and `SnapshotReader`.
//!
//! A snapshot file is `[magic(4)][version(1)][body]`. Writing goes through
//! a temp file in the same directory, fsynced, then renamed into place, so
//! a reader never observes a partially written snapshot (spec §6).

use super::codec::{SnapshotCodec, SnapshotCodecError, SnapshotCodecV1, SnapshotCodecV2, SNAPSHOT_MAGIC};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use txn_core::snapshot::{TransactionSnapshot, VisibilityState};

/// Errors reading or writing a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotIoError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The file's magic bytes didn't match, or its version byte has no
    /// registered codec.
    #[error("invalid snapshot header: {0}")]
    InvalidHeader(String),
    /// The body failed to decode under its declared codec.
    #[error(transparent)]
    Codec(#[from] SnapshotCodecError),
}

/// Filename for the snapshot taken at `epoch_millis`.
pub fn snapshot_file_name(epoch_millis: u64) -> String {
    format!("snapshot.{epoch_millis}")
}

/// Writes snapshots atomically: temp file, fsync, rename.
pub struct SnapshotWriter {
    dir: PathBuf,
    codec: Arc<dyn SnapshotCodec>,
}

impl SnapshotWriter {
    /// Build a writer that always encodes with the given codec (callers
    /// should pass the current, highest-version codec).
    pub fn new(dir: impl Into<PathBuf>, codec: Arc<dyn SnapshotCodec>) -> Self {
        SnapshotWriter {
            dir: dir.into(),
            codec,
        }
    }

    /// Write `snapshot` as the snapshot for `epoch_millis`, returning the
    /// final path.
    pub fn write(
        &self,
        epoch_millis: u64,
        snapshot: &TransactionSnapshot,
    ) -> Result<PathBuf, SnapshotIoError> {
        fs::create_dir_all(&self.dir)?;
        let final_path = self.dir.join(snapshot_file_name(epoch_millis));
        let tmp_path = self.dir.join(format!(".{}.tmp", snapshot_file_name(epoch_millis)));

        let body = self.codec.encode(snapshot)?;
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&SNAPSHOT_MAGIC)?;
            tmp.write_all(&[self.codec.version()])?;
            tmp.write_all(&body)?;
            tmp.sync_data()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        Ok(final_path)
    }
}

/// Reads snapshot files, dispatching on the version byte.
pub struct SnapshotReader {
    codecs: Vec<Arc<dyn SnapshotCodec>>,
}

impl Default for SnapshotReader {
    fn default() -> Self {
        SnapshotReader {
            codecs: vec![Arc::new(SnapshotCodecV1), Arc::new(SnapshotCodecV2)],
        }
    }
}

impl SnapshotReader {
    /// Build a reader that recognizes exactly the given codecs.
    pub fn new(codecs: Vec<Arc<dyn SnapshotCodec>>) -> Self {
        SnapshotReader { codecs }
    }

    fn codec_for(&self, version: u8) -> Result<&Arc<dyn SnapshotCodec>, SnapshotIoError> {
        self.codecs
            .iter()
            .find(|c| c.version() == version)
            .ok_or_else(|| {
                SnapshotIoError::InvalidHeader(format!("no codec registered for version {version}"))
            })
    }

    fn read_header<'a>(&self, bytes: &'a [u8]) -> Result<(&Arc<dyn SnapshotCodec>, &'a [u8]), SnapshotIoError> {
        if bytes.len() < 5 || bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotIoError::InvalidHeader(
                "missing or invalid magic bytes".into(),
            ));
        }
        let codec = self.codec_for(bytes[4])?;
        Ok((codec, &bytes[5..]))
    }

    /// Fully decode a snapshot file, including committing/committed change
    /// sets.
    pub fn read(&self, path: &Path) -> Result<TransactionSnapshot, SnapshotIoError> {
        let bytes = read_whole_file(path)?;
        let (codec, body) = self.read_header(&bytes)?;
        Ok(codec.decode(body)?)
    }

    /// Decode only the visibility prefix. Tolerates corruption anywhere
    /// after the visibility segment (spec §4.3) — used by read-only
    /// followers that don't need the committing/committed maps.
    pub fn read_visibility(&self, path: &Path) -> Result<VisibilityState, SnapshotIoError> {
        let bytes = read_whole_file(path)?;
        let (codec, body) = self.read_header(&bytes)?;
        Ok(codec.decode_visibility(body)?)
    }
}

fn read_whole_file(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use txn_core::ids::TxId;

    fn sample() -> TransactionSnapshot {
        TransactionSnapshot {
            visibility: VisibilityState {
                timestamp_millis: 1,
                read_pointer: TxId::new(10),
                write_pointer: TxId::new(10),
                in_progress: BTreeMap::new(),
                invalid: vec![],
            },
            committing_change_sets: BTreeMap::new(),
            committed_change_sets: BTreeMap::new(),
        }
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(dir.path(), Arc::new(SnapshotCodecV2));
        let path = writer.write(1000, &sample()).unwrap();
        assert!(path.ends_with("snapshot.1000"));

        let reader = SnapshotReader::default();
        let decoded = reader.read(&path).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn write_leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(dir.path(), Arc::new(SnapshotCodecV2));
        writer.write(1000, &sample()).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["snapshot.1000".to_string()]);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.1");
        let mut bytes = SNAPSHOT_MAGIC.to_vec();
        bytes.push(99);
        fs::write(&path, &bytes).unwrap();

        let reader = SnapshotReader::default();
        assert!(matches!(
            reader.read(&path),
            Err(SnapshotIoError::InvalidHeader(_))
        ));
    }
}
