//! The durable edit-log alphabet (spec §3, "Edits").
//!
//! Every state mutation the manager performs has exactly one corresponding
//! `Edit` variant; replaying a log of edits from an empty state reproduces
//! the state (spec §8, invariant 5). `Edit` is the domain type; the wire
//! encoding of a sequence of edits lives in `txn-durability`'s codec.

use crate::ids::{ChangeId, TxId};
use crate::transaction::TxType;
use serde::{Deserialize, Serialize};

/// A single durable state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edit {
    /// A transaction was allocated and entered the in-progress set.
    InProgress {
        /// The newly allocated id.
        id: TxId,
        /// SHORT, LONG, or CHECKPOINT.
        tx_type: TxType,
        /// Wall-clock deadline, or `None` for LONG.
        expiration: Option<u64>,
        /// `read_pointer` at allocation time.
        visibility_upper_bound: TxId,
    },
    /// `canCommit` recorded a committing change set for `id`. Repeated
    /// calls for the same `id` append again and overwrite (spec §4.1,
    /// §9 open question).
    CanCommit {
        /// The transaction proposing to commit.
        id: TxId,
        /// The change ids it intends to write.
        change_ids: Vec<ChangeId>,
    },
    /// `id` committed successfully.
    Committed {
        /// The committed transaction.
        id: TxId,
        /// The version its change set is stored under
        /// (`max(write_pointer at commit time, id.write_pointer)`).
        change_set_id: TxId,
    },
    /// `id` was aborted.
    Aborted {
        /// The aborted transaction.
        id: TxId,
    },
    /// `id` was marked invalid.
    Invalid {
        /// The invalidated transaction.
        id: TxId,
    },
    /// `read_pointer`/`write_pointer` moved without a transaction starting
    /// (used by `checkpoint`, and by clock-driven write pointer advances).
    MoveWatermark {
        /// New read pointer, if it advanced.
        read_pointer: Option<TxId>,
        /// New write pointer, if it advanced.
        write_pointer: Option<TxId>,
    },
    /// Ids were removed from the invalid list.
    TruncateInvalidTx {
        /// The ids removed.
        ids: Vec<TxId>,
    },
    /// `id` was checkpointed: `new_write_pointer` was allocated and
    /// associated with the same logical transaction.
    Checkpoint {
        /// The logical transaction's stable id.
        id: TxId,
        /// The newly allocated write pointer.
        new_write_pointer: TxId,
    },
}

impl Edit {
    /// The transaction id this edit primarily concerns, where applicable.
    /// Used for log diagnostics; `MoveWatermark` and bulk
    /// `TruncateInvalidTx` edits have no single owning id.
    pub fn tx_id(&self) -> Option<TxId> {
        match self {
            Edit::InProgress { id, .. }
            | Edit::CanCommit { id, .. }
            | Edit::Committed { id, .. }
            | Edit::Aborted { id }
            | Edit::Invalid { id }
            | Edit::Checkpoint { id, .. } => Some(*id),
            Edit::MoveWatermark { .. } | Edit::TruncateInvalidTx { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_id_extracts_owning_transaction() {
        let edit = Edit::Aborted { id: TxId::new(7) };
        assert_eq!(edit.tx_id(), Some(TxId::new(7)));
    }

    #[test]
    fn watermark_edit_has_no_owning_id() {
        let edit = Edit::MoveWatermark {
            read_pointer: Some(TxId::new(5)),
            write_pointer: None,
        };
        assert_eq!(edit.tx_id(), None);
    }
}
