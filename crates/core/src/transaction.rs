//! The `Transaction` view handed to clients, and the manager-internal
//! `InProgressTx` bookkeeping entry (spec §3).

use crate::ids::TxId;
use serde::{Deserialize, Serialize};

/// Category of an in-progress transaction, differing only in expiration
/// policy (spec glossary).
///
/// Serialized as a single explicit byte (see `txn-durability`'s edit codec)
/// rather than as a derived ordinal, so the mapping stays stable even if
/// variants are reordered in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    /// Expires automatically per the configured default/explicit timeout.
    Short,
    /// Never auto-invalidated by the expiration sweep.
    Long,
    /// A checkpoint of an existing logical transaction; inherits the
    /// parent's expiration rule.
    Checkpoint,
}

/// Immutable snapshot of visibility, handed to a client at `start` or
/// `checkpoint` time (spec §3).
///
/// A `Transaction` never mutates in place: `checkpoint` returns a new one
/// with the same `transaction_id` but an advanced `write_pointer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The allocating id. Stable across checkpoints of the same logical
    /// transaction.
    pub transaction_id: TxId,
    /// The id new writes from this transaction are stamped with.
    pub write_pointer: TxId,
    /// Upper-exclusive bound of versions to consider visible.
    pub read_pointer: TxId,
    /// Ids strictly less than `write_pointer` that must be ignored on read.
    pub invalids: Vec<TxId>,
    /// Ids strictly less than `write_pointer` that are concurrent
    /// (snapshot-isolation exclusion set).
    pub in_progress: Vec<TxId>,
    /// Smallest id of any *short* in-progress transaction, used by readers
    /// as a scan optimization boundary.
    pub first_short_in_progress: Option<TxId>,
    /// Previous write pointers this logical transaction has held, so it can
    /// read its own prior writes after a checkpoint.
    pub checkpoint_write_pointers: Vec<TxId>,
    /// SHORT, LONG, or CHECKPOINT.
    pub tx_type: TxType,
}

impl Transaction {
    /// Whether version `v` is visible to this transaction (spec §3
    /// invariant).
    ///
    /// A version is visible iff it is at or before `read_pointer`, is not
    /// in `invalids`, is not concurrently in progress, and either *is* this
    /// transaction's own id, belongs to one of its prior checkpoints, or
    /// was not written by a transaction that is still in progress.
    pub fn is_visible(&self, v: TxId) -> bool {
        if v > self.read_pointer {
            return false;
        }
        if self.invalids.binary_search(&v).is_ok() {
            return false;
        }
        if v == self.transaction_id || self.checkpoint_write_pointers.contains(&v) {
            return true;
        }
        self.in_progress.binary_search(&v).is_err()
    }
}

/// Manager-internal bookkeeping for a transaction that has started but not
/// yet committed, aborted, or been invalidated (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InProgressTx {
    /// `read_pointer` at the time this transaction started; defines what
    /// "committed since I started" means for conflict detection.
    pub visibility_upper_bound: TxId,
    /// Wall-clock millis at which the manager may invalidate this
    /// transaction, or `None` for LONG transactions.
    pub expiration: Option<u64>,
    /// SHORT, LONG, or CHECKPOINT.
    pub tx_type: TxType,
    /// Prior write pointers this logical transaction has held.
    pub checkpoint_write_pointers: Vec<TxId>,
}

impl InProgressTx {
    /// Whether the expiration sweep may invalidate this entry at `now`.
    ///
    /// LONG transactions are immune; CHECKPOINT entries inherit the
    /// parent's rule via their own `expiration` field, so the check is
    /// uniform here.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        match self.expiration {
            Some(exp) => exp < now_millis,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(read_pointer: u64, invalids: &[u64], in_progress: &[u64]) -> Transaction {
        Transaction {
            transaction_id: TxId::new(1000),
            write_pointer: TxId::new(1000),
            read_pointer: TxId::new(read_pointer),
            invalids: invalids.iter().map(|&v| TxId::new(v)).collect(),
            in_progress: in_progress.iter().map(|&v| TxId::new(v)).collect(),
            first_short_in_progress: None,
            checkpoint_write_pointers: vec![],
            tx_type: TxType::Short,
        }
    }

    #[test]
    fn visible_requires_at_or_before_read_pointer() {
        let t = tx(999, &[], &[]);
        assert!(!t.is_visible(TxId::new(1000)));
        assert!(t.is_visible(TxId::new(999)));
    }

    #[test]
    fn invalid_versions_are_never_visible() {
        let t = tx(999, &[500], &[]);
        assert!(!t.is_visible(TxId::new(500)));
    }

    #[test]
    fn in_progress_versions_are_excluded() {
        let t = tx(999, &[], &[700]);
        assert!(!t.is_visible(TxId::new(700)));
    }

    #[test]
    fn own_id_is_always_visible() {
        let t = tx(500, &[], &[]);
        assert!(t.is_visible(TxId::new(1000)));
    }

    #[test]
    fn checkpoint_write_pointers_are_visible() {
        let mut t = tx(500, &[], &[]);
        t.checkpoint_write_pointers.push(TxId::new(1500));
        assert!(t.is_visible(TxId::new(1500)));
    }

    #[test]
    fn long_tx_is_never_expired() {
        let entry = InProgressTx {
            visibility_upper_bound: TxId::new(0),
            expiration: None,
            tx_type: TxType::Long,
            checkpoint_write_pointers: vec![],
        };
        assert!(!entry.is_expired(u64::MAX));
    }

    #[test]
    fn short_tx_expires_once_deadline_passes() {
        let entry = InProgressTx {
            visibility_upper_bound: TxId::new(0),
            expiration: Some(100),
            tx_type: TxType::Short,
            checkpoint_write_pointers: vec![],
        };
        assert!(!entry.is_expired(100));
        assert!(entry.is_expired(101));
    }
}
