//! The full-state `TransactionSnapshot` DTO (spec §4.3, §6).
//!
//! A snapshot splits into a **visibility prefix** — everything a read-only
//! follower needs to compute visibility — and a **tail** holding the
//! committing/committed change-set maps. The split exists so a codec can
//! offer a `decode_visibility` mode that tolerates corruption in the tail
//! (spec §4.3).

use crate::ids::{ChangeId, TxId};
use crate::transaction::InProgressTx;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The visibility-determining portion of manager state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityState {
    /// Wall-clock millis when the snapshot was taken.
    pub timestamp_millis: u64,
    /// `read_pointer` at snapshot time.
    pub read_pointer: TxId,
    /// `write_pointer` at snapshot time.
    pub write_pointer: TxId,
    /// In-progress transactions, keyed by id.
    pub in_progress: BTreeMap<TxId, InProgressTx>,
    /// Ascending, deduplicated invalid list.
    pub invalid: Vec<TxId>,
}

/// Full manager state as exported by `getSnapshotInputStream` (spec §4.1)
/// and consumed during recovery (spec §4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    /// Visibility prefix, readable independently of the tail.
    pub visibility: VisibilityState,
    /// Change sets between `canCommit` and `commit`.
    pub committing_change_sets: BTreeMap<TxId, Vec<ChangeId>>,
    /// Change sets for committed transactions not yet pruned.
    pub committed_change_sets: BTreeMap<TxId, Vec<ChangeId>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_state_is_independent_of_tail() {
        let visibility = VisibilityState {
            timestamp_millis: 1,
            read_pointer: TxId::new(10),
            write_pointer: TxId::new(10),
            in_progress: BTreeMap::new(),
            invalid: vec![],
        };
        let snap = TransactionSnapshot {
            visibility: visibility.clone(),
            committing_change_sets: BTreeMap::new(),
            committed_change_sets: BTreeMap::new(),
        };
        assert_eq!(snap.visibility, visibility);
    }
}
