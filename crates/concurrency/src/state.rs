//! `ManagerState`: the in-memory structure every transaction-manager
//! operation mutates (spec §3), and `apply_edit`, the single function used
//! both by live operations and by log replay during recovery.
//!
//! Using the same function for both paths is what makes spec §8 invariant 5
//! ("replaying edits from an empty state reproduces the state") hold by
//! construction rather than by two implementations staying in sync by
//! discipline.

use std::collections::BTreeMap;
use txn_core::edit::Edit;
use txn_core::ids::{ChangeId, TxId};
use txn_core::snapshot::{TransactionSnapshot, VisibilityState};
use txn_core::transaction::InProgressTx;

/// The transaction manager's full in-memory state (spec §3).
#[derive(Debug, Clone, Default)]
pub struct ManagerState {
    /// Upper-exclusive bound of versions visible to new readers.
    pub read_pointer: TxId,
    /// Highest id ever allocated.
    pub write_pointer: TxId,
    /// Transactions allocated but not yet committed/aborted/invalidated,
    /// keyed by their stable `transactionId`.
    pub in_progress: BTreeMap<TxId, InProgressTx>,
    /// Ascending, deduplicated list of poisoned ids.
    pub invalid: Vec<TxId>,
    /// Change sets proposed between `canCommit` and `commit`.
    pub committing_change_sets: BTreeMap<TxId, Vec<ChangeId>>,
    /// Change sets for committed transactions not yet pruned.
    pub committed_change_sets: BTreeMap<TxId, Vec<ChangeId>>,
}

impl ManagerState {
    /// Apply one edit, mutating state exactly as the operation that
    /// produced it did.
    pub fn apply_edit(&mut self, edit: &Edit) {
        match edit {
            Edit::InProgress {
                id,
                tx_type,
                expiration,
                visibility_upper_bound,
            } => {
                self.in_progress.insert(
                    *id,
                    InProgressTx {
                        visibility_upper_bound: *visibility_upper_bound,
                        expiration: *expiration,
                        tx_type: *tx_type,
                        checkpoint_write_pointers: Vec::new(),
                    },
                );
                if *id > self.write_pointer {
                    self.write_pointer = *id;
                }
            }
            Edit::CanCommit { id, change_ids } => {
                self.committing_change_sets.insert(*id, change_ids.clone());
            }
            Edit::Committed { id, change_set_id } => {
                let changes = self.committing_change_sets.remove(id).unwrap_or_default();
                self.in_progress.remove(id);
                if !changes.is_empty() {
                    self.committed_change_sets.insert(*change_set_id, changes);
                }
                self.advance_read_pointer();
            }
            Edit::Aborted { id } => {
                self.in_progress.remove(id);
                self.committing_change_sets.remove(id);
            }
            Edit::Invalid { id } => {
                self.in_progress.remove(id);
                self.committing_change_sets.remove(id);
                self.committed_change_sets.remove(id);
                if let Err(pos) = self.invalid.binary_search(id) {
                    self.invalid.insert(pos, *id);
                }
            }
            Edit::MoveWatermark {
                read_pointer,
                write_pointer,
            } => {
                if let Some(rp) = read_pointer {
                    self.read_pointer = *rp;
                }
                if let Some(wp) = write_pointer {
                    self.write_pointer = *wp;
                }
            }
            Edit::TruncateInvalidTx { ids } => {
                self.invalid.retain(|id| !ids.contains(id));
            }
            Edit::Checkpoint { id, new_write_pointer } => {
                if let Some(entry) = self.in_progress.get_mut(id) {
                    entry.checkpoint_write_pointers.push(*new_write_pointer);
                }
                if *new_write_pointer > self.write_pointer {
                    self.write_pointer = *new_write_pointer;
                }
            }
        }
    }

    /// Advance `read_pointer` past committed ids no longer blocked by any
    /// earlier in-progress transaction (spec §4.1 `commit`).
    fn advance_read_pointer(&mut self) {
        match self.in_progress.keys().next() {
            None => self.read_pointer = self.write_pointer,
            Some(&min_in_progress) if min_in_progress > self.read_pointer => {
                self.read_pointer = TxId::new(min_in_progress.raw() - 1);
            }
            Some(_) => {}
        }
    }

    /// The smallest id among in-progress SHORT transactions, used by
    /// `Transaction::first_short_in_progress` as a reader scan hint.
    pub fn first_short_in_progress(&self) -> Option<TxId> {
        self.in_progress
            .iter()
            .filter(|(_, tx)| tx.tx_type == txn_core::transaction::TxType::Short)
            .map(|(&id, _)| id)
            .min()
    }

    /// Project the current state into a `TransactionSnapshot` DTO, for
    /// `getSnapshotInputStream` or periodic snapshotting. Does not mutate
    /// state.
    pub fn to_snapshot(&self, timestamp_millis: u64) -> TransactionSnapshot {
        TransactionSnapshot {
            visibility: VisibilityState {
                timestamp_millis,
                read_pointer: self.read_pointer,
                write_pointer: self.write_pointer,
                in_progress: self.in_progress.clone(),
                invalid: self.invalid.clone(),
            },
            committing_change_sets: self.committing_change_sets.clone(),
            committed_change_sets: self.committed_change_sets.clone(),
        }
    }

    /// Rebuild state from a previously exported snapshot.
    pub fn from_snapshot(snapshot: TransactionSnapshot) -> Self {
        ManagerState {
            read_pointer: snapshot.visibility.read_pointer,
            write_pointer: snapshot.visibility.write_pointer,
            in_progress: snapshot.visibility.in_progress,
            invalid: snapshot.visibility.invalid,
            committing_change_sets: snapshot.committing_change_sets,
            committed_change_sets: snapshot.committed_change_sets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txn_core::transaction::TxType;

    fn in_progress_edit(id: u64, vub: u64) -> Edit {
        Edit::InProgress {
            id: TxId::new(id),
            tx_type: TxType::Short,
            expiration: Some(u64::MAX),
            visibility_upper_bound: TxId::new(vub),
        }
    }

    #[test]
    fn in_progress_advances_write_pointer() {
        let mut state = ManagerState::default();
        state.apply_edit(&in_progress_edit(1000, 0));
        assert_eq!(state.write_pointer, TxId::new(1000));
        assert!(state.in_progress.contains_key(&TxId::new(1000)));
    }

    #[test]
    fn committed_moves_change_set_and_advances_read_pointer() {
        let mut state = ManagerState::default();
        state.apply_edit(&in_progress_edit(1000, 0));
        state.apply_edit(&Edit::CanCommit {
            id: TxId::new(1000),
            change_ids: vec![ChangeId::new(vec![0x61])],
        });
        state.apply_edit(&Edit::Committed {
            id: TxId::new(1000),
            change_set_id: TxId::new(1000),
        });

        assert!(!state.in_progress.contains_key(&TxId::new(1000)));
        assert!(!state.committing_change_sets.contains_key(&TxId::new(1000)));
        assert_eq!(
            state.committed_change_sets.get(&TxId::new(1000)),
            Some(&vec![ChangeId::new(vec![0x61])])
        );
        assert_eq!(state.read_pointer, TxId::new(1000));
    }

    #[test]
    fn committed_with_empty_write_set_is_not_recorded() {
        let mut state = ManagerState::default();
        state.apply_edit(&in_progress_edit(1000, 0));
        state.apply_edit(&Edit::Committed {
            id: TxId::new(1000),
            change_set_id: TxId::new(1000),
        });
        assert!(!state.committed_change_sets.contains_key(&TxId::new(1000)));
    }

    #[test]
    fn invalid_removes_from_every_map_and_stays_sorted() {
        let mut state = ManagerState::default();
        state.apply_edit(&in_progress_edit(1000, 0));
        state.apply_edit(&in_progress_edit(500, 0));
        state.apply_edit(&Edit::Invalid { id: TxId::new(1000) });
        state.apply_edit(&Edit::Invalid { id: TxId::new(500) });
        assert_eq!(state.invalid, vec![TxId::new(500), TxId::new(1000)]);
        assert!(state.in_progress.is_empty());
    }

    #[test]
    fn checkpoint_tracks_prior_write_pointers_on_the_same_entry() {
        let mut state = ManagerState::default();
        state.apply_edit(&in_progress_edit(1000, 0));
        state.apply_edit(&Edit::Checkpoint {
            id: TxId::new(1000),
            new_write_pointer: TxId::new(1500),
        });
        let entry = &state.in_progress[&TxId::new(1000)];
        assert_eq!(entry.checkpoint_write_pointers, vec![TxId::new(1500)]);
        assert_eq!(state.write_pointer, TxId::new(1500));
    }

    #[test]
    fn replaying_the_same_edits_from_empty_state_reproduces_it() {
        let edits = vec![
            in_progress_edit(1000, 0),
            Edit::CanCommit {
                id: TxId::new(1000),
                change_ids: vec![ChangeId::new(vec![0x61])],
            },
            Edit::Committed {
                id: TxId::new(1000),
                change_set_id: TxId::new(1000),
            },
        ];

        let mut a = ManagerState::default();
        for e in &edits {
            a.apply_edit(e);
        }
        let mut b = ManagerState::default();
        for e in &edits {
            b.apply_edit(e);
        }
        assert_eq!(a.read_pointer, b.read_pointer);
        assert_eq!(a.committed_change_sets, b.committed_change_sets);
    }
}
