//! `TransactionManager`: the public API implementing spec §4.1.
//!
//! Every operation below takes the same `parking_lot::Mutex<Inner>` —
//! `ManagerState` and the active `LogWriter` are locked together, so the
//! edit-log flush happens inside the same critical section as the state
//! mutation it durably records (spec §5's scheduling model). The lock is
//! released before the caller's RPC reply is formed; it is never held
//! across I/O other than the log append itself.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use txn_core::edit::Edit;
use txn_core::ids::{ChangeId, TxId};
use txn_core::transaction::{Transaction, TxType};
use txn_core::{Error, ManagerConfig, Result};
use txn_durability::wal::{DurabilityMode, LogWriter, WalConfig};
use txn_durability::{codec::EditCodecV1, now_millis, snapshot::SnapshotCodecV2, StateStorage};

use crate::conflict::find_conflict;
use crate::state::ManagerState;

struct Inner {
    state: ManagerState,
    log: LogWriter,
}

/// Point-in-time counts and watermarks, for the façade's `status` RPC.
#[derive(Debug, Clone, Copy)]
pub struct ManagerStatus {
    /// Number of transactions currently in progress.
    pub in_progress_count: usize,
    /// Number of ids in the invalid list.
    pub invalid_count: usize,
    /// Number of transactions between `canCommit` and `commit`.
    pub committing_count: usize,
    /// Number of retained committed change sets.
    pub committed_count: usize,
    /// Current read pointer.
    pub read_pointer: TxId,
    /// Current write pointer.
    pub write_pointer: TxId,
}

/// The transaction manager (spec §4.1).
pub struct TransactionManager {
    config: ManagerConfig,
    inner: Mutex<Inner>,
    storage: Arc<StateStorage>,
}

impl TransactionManager {
    /// Open the manager, recovering from the newest snapshot and replaying
    /// its log segments (spec §4.3).
    pub fn open(config: ManagerConfig, mode: DurabilityMode) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;

        let storage = Arc::new(StateStorage::new(
            config.snapshot_dir.clone(),
            Arc::new(SnapshotCodecV2),
            Arc::new(EditCodecV1),
        ));

        let plan = storage
            .recover()
            .map_err(|e| Error::SnapshotFailure(e.to_string()))?;
        if plan.torn_tail_discarded {
            warn!(epoch_millis = plan.epoch_millis, "recovered with a torn log tail discarded");
        }

        let mut state = match plan.snapshot {
            Some(snapshot) => ManagerState::from_snapshot(snapshot),
            None => ManagerState::default(),
        };
        for edit in &plan.edits {
            state.apply_edit(edit);
        }
        info!(
            in_progress = state.in_progress.len(),
            read_pointer = %state.read_pointer,
            write_pointer = %state.write_pointer,
            "recovered transaction manager state"
        );

        let log = LogWriter::open_for_append(
            storage.dir(),
            plan.epoch_millis,
            WalConfig::default(),
            mode,
            Arc::new(EditCodecV1),
            plan.next_seq,
        )
        .map_err(|e| Error::LogFailure(e.to_string()))?;

        Ok(TransactionManager {
            config,
            inner: Mutex::new(Inner { state, log }),
            storage,
        })
    }

    fn advance_write_pointer(state: &mut ManagerState, max_per_ms: u64) -> TxId {
        let clock_based = now_millis() * max_per_ms;
        let next = std::cmp::max(state.write_pointer.raw() + 1, clock_based);
        state.write_pointer = TxId::new(next);
        state.write_pointer
    }

    fn append(inner: &mut Inner, edit: Edit) -> Result<()> {
        inner
            .log
            .append_one(&edit)
            .map_err(|e| Error::LogFailure(e.to_string()))?;
        inner.state.apply_edit(&edit);
        Ok(())
    }

    fn build_transaction(state: &ManagerState, transaction_id: TxId, write_pointer: TxId, tx_type: TxType) -> Transaction {
        let in_progress: Vec<TxId> = state
            .in_progress
            .keys()
            .filter(|&&id| id != transaction_id)
            .copied()
            .collect();
        let first_short_in_progress = state
            .in_progress
            .iter()
            .filter(|(&id, tx)| id != transaction_id && tx.tx_type == TxType::Short)
            .map(|(&id, _)| id)
            .min();
        let checkpoint_write_pointers = state
            .in_progress
            .get(&transaction_id)
            .map(|e| e.checkpoint_write_pointers.clone())
            .unwrap_or_default();

        Transaction {
            transaction_id,
            write_pointer,
            read_pointer: state.read_pointer,
            invalids: state.invalid.clone(),
            in_progress,
            first_short_in_progress,
            checkpoint_write_pointers,
            tx_type,
        }
    }

    /// Start a SHORT transaction. `timeout_seconds` defaults to
    /// `tx_timeout_default_seconds`; must be in `(0, tx_timeout_max_seconds]`.
    pub fn start_short(&self, timeout_seconds: Option<u64>) -> Result<Transaction> {
        let timeout = timeout_seconds.unwrap_or(self.config.tx_timeout_default_seconds);
        if timeout == 0 || timeout > self.config.tx_timeout_max_seconds {
            return Err(Error::InvalidArgument(format!(
                "timeout {timeout}s must be in (0, {}]",
                self.config.tx_timeout_max_seconds
            )));
        }

        let mut inner = self.inner.lock();
        let id = Self::advance_write_pointer(&mut inner.state, self.config.tx_max_per_ms);
        let visibility_upper_bound = inner.state.read_pointer;
        let expiration = now_millis() + timeout * 1000;

        Self::append(
            &mut inner,
            Edit::InProgress {
                id,
                tx_type: TxType::Short,
                expiration: Some(expiration),
                visibility_upper_bound,
            },
        )?;

        debug!(tx_id = %id, timeout, "started short transaction");
        Ok(Self::build_transaction(&inner.state, id, id, TxType::Short))
    }

    /// Start a LONG transaction: no expiration, immune to the sweep.
    pub fn start_long(&self) -> Result<Transaction> {
        let mut inner = self.inner.lock();
        let id = Self::advance_write_pointer(&mut inner.state, self.config.tx_max_per_ms);
        let visibility_upper_bound = inner.state.read_pointer;

        Self::append(
            &mut inner,
            Edit::InProgress {
                id,
                tx_type: TxType::Long,
                expiration: None,
                visibility_upper_bound,
            },
        )?;

        debug!(tx_id = %id, "started long transaction");
        Ok(Self::build_transaction(&inner.state, id, id, TxType::Long))
    }

    /// Allocate a new write pointer for an existing logical transaction
    /// (spec §4.1 `checkpoint`). `tx.transactionId` is unchanged.
    pub fn checkpoint(&self, tx: &Transaction) -> Result<Transaction> {
        let mut inner = self.inner.lock();
        if !inner.state.in_progress.contains_key(&tx.transaction_id) {
            return Err(Error::NotInProgress(tx.transaction_id));
        }
        let new_write_pointer = Self::advance_write_pointer(&mut inner.state, self.config.tx_max_per_ms);

        Self::append(
            &mut inner,
            Edit::Checkpoint {
                id: tx.transaction_id,
                new_write_pointer,
            },
        )?;

        Ok(Self::build_transaction(
            &inner.state,
            tx.transaction_id,
            new_write_pointer,
            TxType::Checkpoint,
        ))
    }

    /// Propose a change set. Returns `Ok(false)` (not an error) on
    /// conflict — the caller must `abort`. Repeatable: each call replaces
    /// the committing change set for `tx` (spec §9 open question).
    pub fn can_commit(&self, tx: &Transaction, change_ids: Vec<ChangeId>) -> Result<bool> {
        let mut inner = self.inner.lock();
        let entry = inner
            .state
            .in_progress
            .get(&tx.transaction_id)
            .ok_or(Error::NotInProgress(tx.transaction_id))?
            .clone();

        if let Some(conflicting) =
            find_conflict(&inner.state.committed_change_sets, entry.visibility_upper_bound, &change_ids)
        {
            debug!(tx_id = %tx.transaction_id, conflicting = %conflicting, "canCommit found a conflict");
            return Ok(false);
        }

        Self::append(
            &mut inner,
            Edit::CanCommit {
                id: tx.transaction_id,
                change_ids,
            },
        )?;
        Ok(true)
    }

    /// Finalize a commit. Returns `Ok(false)` on conflict, leaving the
    /// transaction in progress — the caller must `abort`.
    pub fn commit(&self, tx: &Transaction) -> Result<bool> {
        let mut inner = self.inner.lock();
        let entry = inner
            .state
            .in_progress
            .get(&tx.transaction_id)
            .ok_or(Error::NotInProgress(tx.transaction_id))?
            .clone();
        let changes = inner
            .state
            .committing_change_sets
            .get(&tx.transaction_id)
            .cloned()
            .unwrap_or_default();

        if let Some(conflicting) = find_conflict(&inner.state.committed_change_sets, entry.visibility_upper_bound, &changes) {
            debug!(tx_id = %tx.transaction_id, conflicting = %conflicting, "commit found a conflict");
            return Ok(false);
        }

        let change_set_id = TxId::new(std::cmp::max(inner.state.write_pointer.raw(), tx.write_pointer.raw()));
        Self::append(
            &mut inner,
            Edit::Committed {
                id: tx.transaction_id,
                change_set_id,
            },
        )?;
        info!(tx_id = %tx.transaction_id, change_set_id = %change_set_id, "committed transaction");
        Ok(true)
    }

    /// Abort `tx`. Idempotent: a no-op if `tx` is already terminal.
    pub fn abort(&self, tx: &Transaction) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state.in_progress.contains_key(&tx.transaction_id) {
            Self::append(&mut inner, Edit::Aborted { id: tx.transaction_id })?;
            debug!(tx_id = %tx.transaction_id, "aborted transaction");
        }
        Ok(())
    }

    /// Mark `id` invalid. Returns `false` if it was already invalid
    /// (idempotent w.r.t. repeated calls).
    pub fn invalidate(&self, id: TxId) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.state.invalid.binary_search(&id).is_ok() {
            return Ok(false);
        }
        Self::append(&mut inner, Edit::Invalid { id })?;
        warn!(tx_id = %id, "invalidated transaction");
        Ok(true)
    }

    /// Remove the intersection of `ids` with the invalid list. Returns
    /// `false` if nothing changed.
    pub fn truncate_invalid_tx(&self, ids: &[TxId]) -> Result<bool> {
        let mut inner = self.inner.lock();
        let to_remove: Vec<TxId> = ids
            .iter()
            .copied()
            .filter(|id| inner.state.invalid.binary_search(id).is_ok())
            .collect();
        if to_remove.is_empty() {
            return Ok(false);
        }
        Self::append(&mut inner, Edit::TruncateInvalidTx { ids: to_remove })?;
        Ok(true)
    }

    /// Remove every invalid id whose timestamp prefix is before
    /// `cutoff_millis`. Fails with `InvalidTruncateTime` if an in-progress
    /// transaction is older than the cutoff.
    pub fn truncate_invalid_tx_before(&self, cutoff_millis: u64) -> Result<bool> {
        let mut inner = self.inner.lock();
        let cutoff = TxId::first_at(cutoff_millis);

        if let Some(&oldest) = inner.state.in_progress.keys().next() {
            if oldest < cutoff {
                return Err(Error::InvalidTruncateTime {
                    cutoff: cutoff.raw(),
                    oldest,
                });
            }
        }

        let to_remove: Vec<TxId> = inner
            .state
            .invalid
            .iter()
            .copied()
            .filter(|&id| id < cutoff)
            .collect();
        if to_remove.is_empty() {
            return Ok(false);
        }
        Self::append(&mut inner, Edit::TruncateInvalidTx { ids: to_remove })?;
        Ok(true)
    }

    /// Drop committed change sets that can never again cause a conflict:
    /// anything at or below `min(readPointer, earliest in-progress
    /// visibilityUpperBound)`. Purely in-memory retention; not logged,
    /// since it is always re-derivable from `committed_change_sets` plus
    /// the current watermarks.
    pub fn prune_now(&self) {
        let mut inner = self.inner.lock();
        let earliest_vub = inner
            .state
            .in_progress
            .values()
            .map(|e| e.visibility_upper_bound)
            .min();
        let horizon = match earliest_vub {
            Some(v) => std::cmp::min(inner.state.read_pointer, v),
            None => inner.state.read_pointer,
        };
        let before = inner.state.committed_change_sets.len();
        inner.state.committed_change_sets.retain(|&id, _| id > horizon);
        let dropped = before - inner.state.committed_change_sets.len();
        if dropped > 0 {
            debug!(dropped, horizon = %horizon, "pruned committed change sets");
        }
    }

    /// Export a consistent, non-mutating snapshot of current state.
    pub fn get_snapshot_input_stream(&self) -> txn_core::TransactionSnapshot {
        let inner = self.inner.lock();
        inner.state.to_snapshot(now_millis())
    }

    /// Take a durable snapshot, roll the log to a new epoch, and prune old
    /// epochs past the retention count (spec §4.3, §6). Intended to be
    /// driven by a periodic task at `snapshot_interval_seconds`.
    pub fn take_snapshot(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let epoch = now_millis();
        let snapshot = inner.state.to_snapshot(epoch);
        self.storage
            .write_snapshot(epoch, &snapshot)
            .map_err(|e| Error::SnapshotFailure(e.to_string()))?;

        inner.log = LogWriter::open_for_append(
            self.storage.dir(),
            epoch,
            WalConfig::default(),
            DurabilityMode::Always,
            Arc::new(EditCodecV1),
            0,
        )
        .map_err(|e| Error::LogFailure(e.to_string()))?;
        drop(inner);

        self.storage
            .prune(self.config.snapshot_retain_count as usize)
            .map_err(|e| Error::SnapshotFailure(e.to_string()))?;
        Ok(())
    }

    /// Administrative reset: blank all state and start a fresh epoch.
    pub fn reset_state(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.state = ManagerState::default();
        Self::append(
            &mut inner,
            Edit::MoveWatermark {
                read_pointer: Some(TxId::new(0)),
                write_pointer: Some(TxId::new(0)),
            },
        )?;
        warn!("manager state was administratively reset");
        Ok(())
    }

    /// Invalidate every SHORT transaction whose expiration has passed
    /// (spec §4.1 "Timeout/cleanup sweep"). Returns the number invalidated.
    pub fn expire_timed_out(&self) -> Result<usize> {
        let now = now_millis();
        let expired: Vec<TxId> = {
            let inner = self.inner.lock();
            inner
                .state
                .in_progress
                .iter()
                .filter(|(_, tx)| tx.is_expired(now))
                .map(|(&id, _)| id)
                .collect()
        };
        for &id in &expired {
            self.invalidate(id)?;
        }
        Ok(expired.len())
    }

    /// Point-in-time counts and watermarks.
    pub fn status(&self) -> ManagerStatus {
        let inner = self.inner.lock();
        ManagerStatus {
            in_progress_count: inner.state.in_progress.len(),
            invalid_count: inner.state.invalid.len(),
            committing_count: inner.state.committing_change_sets.len(),
            committed_count: inner.state.committed_change_sets.len(),
            read_pointer: inner.state.read_pointer,
            write_pointer: inner.state.write_pointer,
        }
    }

    /// Size of the invalid list.
    pub fn get_invalid_size(&self) -> usize {
        self.inner.lock().state.invalid.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &std::path::Path) -> TransactionManager {
        let config = ManagerConfig::with_snapshot_dir(dir.to_string_lossy().to_string());
        TransactionManager::open(config, DurabilityMode::Always).unwrap()
    }

    #[test]
    fn successful_commit_advances_read_pointer_and_records_change_set() {
        let dir = TempDir::new().unwrap();
        let m = manager(dir.path());

        let tx = m.start_short(None).unwrap();
        assert!(m.can_commit(&tx, vec![ChangeId::new(vec![0x61])]).unwrap());
        assert!(m.commit(&tx).unwrap());

        let status = m.status();
        assert_eq!(status.in_progress_count, 0);
        assert!(status.read_pointer >= tx.transaction_id);
    }

    #[test]
    fn second_writer_to_the_same_key_conflicts() {
        let dir = TempDir::new().unwrap();
        let m = manager(dir.path());

        let tx1 = m.start_short(None).unwrap();
        let tx2 = m.start_short(None).unwrap();

        assert!(m.can_commit(&tx1, vec![ChangeId::new(vec![0x61])]).unwrap());
        assert!(m.commit(&tx1).unwrap());

        assert!(!m.can_commit(&tx2, vec![ChangeId::new(vec![0x61])]).unwrap());
        m.abort(&tx2).unwrap();
        assert_eq!(m.status().in_progress_count, 0);
    }

    #[test]
    fn abort_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let m = manager(dir.path());
        let tx = m.start_short(None).unwrap();
        m.abort(&tx).unwrap();
        m.abort(&tx).unwrap();
    }

    #[test]
    fn invalidate_is_not_idempotent_in_its_return_value() {
        let dir = TempDir::new().unwrap();
        let m = manager(dir.path());
        let tx = m.start_short(None).unwrap();
        assert!(m.invalidate(tx.transaction_id).unwrap());
        assert!(!m.invalidate(tx.transaction_id).unwrap());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = TempDir::new().unwrap();
        let m = manager(dir.path());
        assert!(matches!(
            m.start_short(Some(0)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn timeout_above_max_is_rejected() {
        let dir = TempDir::new().unwrap();
        let m = manager(dir.path());
        assert!(matches!(
            m.start_short(Some(10_000)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn commit_on_unknown_transaction_is_not_in_progress() {
        let dir = TempDir::new().unwrap();
        let m = manager(dir.path());
        let tx = m.start_short(None).unwrap();
        m.abort(&tx).unwrap();
        assert!(matches!(m.commit(&tx), Err(Error::NotInProgress(_))));
    }

    #[test]
    fn truncate_invalid_before_a_live_transaction_fails() {
        let dir = TempDir::new().unwrap();
        let m = manager(dir.path());
        let tx = m.start_short(None).unwrap();
        let cutoff = tx.transaction_id.timestamp_millis() + 1;
        assert!(matches!(
            m.truncate_invalid_tx_before(cutoff),
            Err(Error::InvalidTruncateTime { .. })
        ));
    }

    #[test]
    fn recovery_replays_a_committed_transaction() {
        let dir = TempDir::new().unwrap();
        let tx = {
            let m = manager(dir.path());
            let tx = m.start_short(None).unwrap();
            m.can_commit(&tx, vec![ChangeId::new(vec![0x61])]).unwrap();
            m.commit(&tx).unwrap();
            tx
        };

        let m2 = manager(dir.path());
        let status = m2.status();
        assert_eq!(status.in_progress_count, 0);
        assert!(status.read_pointer >= tx.transaction_id);
    }
}
