//! The `Participant` trait: one resource driven through a transaction's
//! lifecycle by the orchestrator (spec §4.4).

use txn_core::{ChangeId, Transaction};

/// A resource that can buffer writes under a transaction and participate
/// in its two-phase finish.
///
/// Every method is called by the orchestrator at a specific lifecycle
/// point; implementors should not assume any particular threading model
/// beyond "one orchestrator drives these calls sequentially for a single
/// transaction attempt."
pub trait Participant: Send {
    /// Called once `start` has allocated a `Transaction`. Implementors
    /// should tag subsequent writes with `tx.write_pointer`.
    fn start(&mut self, tx: &Transaction);

    /// Called after `checkpoint` allocates a new write pointer for the
    /// same logical transaction.
    fn update_tx(&mut self, tx: &Transaction);

    /// The change ids this participant's buffered writes touch, passed to
    /// `canCommit`.
    fn get_changes(&self) -> Vec<ChangeId>;

    /// Durably persist buffered writes. `false` means this participant
    /// failed to persist and every participant must roll back.
    fn persist(&mut self) -> bool;

    /// Undo buffered writes after a failed `persist`, conflict, or commit
    /// failure. `false` means rollback itself failed, forcing the
    /// orchestrator to `invalidate` rather than `abort`.
    fn rollback(&mut self) -> bool;

    /// Called after a successful `commit`; writes become visible. `false`
    /// means this participant failed to finalize — the transaction is
    /// already durably committed, so the orchestrator reports a
    /// `tx-failure` rather than rolling back.
    fn post_commit(&mut self) -> bool;
}
