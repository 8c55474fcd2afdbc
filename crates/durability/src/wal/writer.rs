//! `LogWriter`: the single-writer-thread append path for the edit log.
//!
//! One segment file is open for writing at a time, named
//! `txlog.<epoch>.<n>` under the configured directory, where `epoch` is
//! the timestamp of the snapshot this log's edits are relative to (spec
//! §6 filesystem layout: "one per snapshot epoch"). `n` only advances when
//! `segment_size_limit_bytes` is exceeded; in the common case a whole
//! epoch lives in a single `.1` segment.

use super::config::WalConfig;
use super::mode::DurabilityMode;
use crate::codec::EditCodec;
use crate::format::{LogRecord, RecordFrame, LOG_FORMAT_VERSION_2, LOG_MAGIC};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use txn_core::Edit;

use super::reader::WalError;

/// Appends edit groups to the active log segment.
///
/// Per spec §5, the edit-log flush happens *inside* the manager's critical
/// section: `append_group` must return only once the group is durable (for
/// `DurabilityMode::Always`), so the manager can safely report success to
/// its caller immediately afterward.
pub struct LogWriter {
    file: File,
    path: PathBuf,
    dir: PathBuf,
    epoch_millis: u64,
    segment_number: u64,
    write_position: u64,
    config: WalConfig,
    mode: DurabilityMode,
    codec: Arc<dyn EditCodec>,
    next_seq: u64,
}

impl LogWriter {
    /// Open (creating if necessary) the log for a snapshot epoch, ready to
    /// append starting at `next_seq`.
    ///
    /// `next_seq` must be one greater than the highest sequence number
    /// already durable for this epoch — callers obtain it from
    /// `StateStorage`'s recovery scan.
    pub fn open_for_append(
        dir: &Path,
        epoch_millis: u64,
        config: WalConfig,
        mode: DurabilityMode,
        codec: Arc<dyn EditCodec>,
        next_seq: u64,
    ) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;

        let segment_number = Self::latest_segment_number(dir, epoch_millis).unwrap_or(0) + 1;
        let path = Self::segment_path(dir, epoch_millis, segment_number);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let write_position = file.metadata()?.len();

        if write_position == 0 {
            file.write_all(&LOG_MAGIC)?;
            file.write_all(&[LOG_FORMAT_VERSION_2])?;
            file.flush()?;
        }

        Ok(LogWriter {
            file,
            path,
            dir: dir.to_path_buf(),
            epoch_millis,
            segment_number,
            write_position: write_position.max(5),
            config,
            mode,
            codec,
            next_seq,
        })
    }

    /// Filesystem name for segment `n` of the given epoch.
    pub fn segment_path(dir: &Path, epoch_millis: u64, n: u64) -> PathBuf {
        dir.join(format!("txlog.{epoch_millis}.{n}"))
    }

    fn latest_segment_number(dir: &Path, epoch_millis: u64) -> Option<u64> {
        let prefix = format!("txlog.{epoch_millis}.");
        std::fs::read_dir(dir)
            .ok()?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .filter_map(|name| name.strip_prefix(&prefix)?.parse::<u64>().ok())
            .max()
    }

    /// Append a single edit as a group of one and fsync (when
    /// `DurabilityMode::Always`) before returning.
    pub fn append_one(&mut self, edit: &Edit) -> Result<(), WalError> {
        self.append_group(std::slice::from_ref(edit))
    }

    /// Append a group of edits atomically: a `COMMIT_MARKER` carrying the
    /// count, followed by each edit record, followed by one fsync.
    ///
    /// A crash partway through leaves the marker's promised count
    /// unfulfilled; `LogReader` detects and discards that torn tail on
    /// replay (spec §6).
    pub fn append_group(&mut self, edits: &[Edit]) -> Result<(), WalError> {
        if edits.is_empty() {
            return Ok(());
        }

        let marker = LogRecord::CommitMarker {
            count: edits.len() as u32,
        };
        self.write_logical(&marker)?;

        for edit in edits {
            let bytes = self.codec.encode(edit)?;
            let record = LogRecord::Edit {
                seq: self.next_seq,
                bytes,
            };
            self.write_logical(&record)?;
            self.next_seq += 1;
        }

        if self.mode == DurabilityMode::Always {
            self.file.sync_data()?;
        }

        if self.write_position >= self.config.segment_size_limit_bytes {
            self.rotate()?;
        }

        Ok(())
    }

    fn write_logical(&mut self, record: &LogRecord) -> io::Result<()> {
        let frame = RecordFrame::encode(&record.to_payload());
        self.file.write_all(&frame)?;
        self.write_position += frame.len() as u64;
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.segment_number += 1;
        let path = Self::segment_path(&self.dir, self.epoch_millis, self.segment_number);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(&LOG_MAGIC)?;
        file.write_all(&[LOG_FORMAT_VERSION_2])?;
        file.flush()?;
        self.file = file;
        self.path = path;
        self.write_position = 5;
        Ok(())
    }

    /// Path of the segment currently being written.
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Next sequence number that will be assigned.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EditCodecV1;
    use tempfile::TempDir;
    use txn_core::ids::TxId;

    fn writer(dir: &Path, config: WalConfig) -> LogWriter {
        LogWriter::open_for_append(
            dir,
            1000,
            config,
            DurabilityMode::Always,
            Arc::new(EditCodecV1),
            0,
        )
        .unwrap()
    }

    #[test]
    fn append_one_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(dir.path(), WalConfig::default());
        w.append_one(&Edit::Aborted { id: TxId::new(1) }).unwrap();
        w.append_one(&Edit::Aborted { id: TxId::new(2) }).unwrap();

        let bytes = std::fs::read(w.current_path()).unwrap();
        assert_eq!(&bytes[0..4], &LOG_MAGIC);
        assert_eq!(w.next_seq(), 2);
    }

    #[test]
    fn rotation_creates_a_new_segment_file() {
        let dir = TempDir::new().unwrap();
        let config = WalConfig {
            segment_size_limit_bytes: 1,
        };
        let mut w = writer(dir.path(), config);
        w.append_one(&Edit::Aborted { id: TxId::new(1) }).unwrap();
        w.append_one(&Edit::Aborted { id: TxId::new(2) }).unwrap();

        assert!(w.current_path().ends_with("txlog.1000.2"));
    }

    #[test]
    fn reopening_continues_from_given_seq() {
        let dir = TempDir::new().unwrap();
        {
            let mut w = writer(dir.path(), WalConfig::default());
            w.append_one(&Edit::Aborted { id: TxId::new(1) }).unwrap();
        }
        let w2 = LogWriter::open_for_append(
            dir.path(),
            1000,
            WalConfig::default(),
            DurabilityMode::Always,
            Arc::new(EditCodecV1),
            1,
        )
        .unwrap();
        assert_eq!(w2.next_seq(), 1);
        assert!(w2.current_path().ends_with("txlog.1000.1"));
    }
}
