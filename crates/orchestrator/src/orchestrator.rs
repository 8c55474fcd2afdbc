//! `TxOrchestrator`: the client-side lifecycle driver (spec §4.4).
//!
//! Drives a set of `Participant`s through start → change collection →
//! `canCommit` → persist → `commit` → post-commit → (rollback|invalidate),
//! retrying only on conflict per the configured `RetryPolicy`.

use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{debug, warn};

use txn_core::Transaction;
use txn_manager::TransactionManager;

use crate::participant::Participant;
use crate::retry::{ExponentialBackoff, RetryPolicy};

/// Why an orchestrated unit of work failed.
#[derive(Debug, Error)]
pub enum TxFailure {
    /// `canCommit` or `commit` detected a conflict and retries were
    /// exhausted.
    #[error("transaction conflict: retries exhausted")]
    Conflict,
    /// A participant's `persist` returned `false`.
    #[error("a participant failed to persist its writes")]
    PersistFailed,
    /// The caller's work closure returned an error.
    #[error("unit of work failed: {0}")]
    Work(String),
    /// The transaction committed durably, but a participant's
    /// `post_commit` failed. Not rolled back — the commit already
    /// happened — so this is reported to the caller as-is.
    #[error("transaction committed but a participant failed to finalize post-commit")]
    PostCommitFailed,
    /// The manager itself returned an error (not a conflict).
    #[error(transparent)]
    Manager(#[from] txn_core::Error),
}

/// Drives participants through the transaction lifecycle.
pub struct TxOrchestrator {
    manager: Arc<TransactionManager>,
    retry_policy: Box<dyn RetryPolicy>,
}

impl TxOrchestrator {
    /// Build an orchestrator with the default bounded exponential backoff.
    pub fn new(manager: Arc<TransactionManager>) -> Self {
        TxOrchestrator {
            manager,
            retry_policy: Box::new(ExponentialBackoff::default()),
        }
    }

    /// Build an orchestrator with a custom retry policy.
    pub fn with_retry_policy(manager: Arc<TransactionManager>, retry_policy: Box<dyn RetryPolicy>) -> Self {
        TxOrchestrator {
            manager,
            retry_policy,
        }
    }

    /// Run `work` once per attempt under a fresh SHORT transaction,
    /// retrying on conflict per the retry policy.
    ///
    /// `work` receives the `Transaction` view and the participant list so
    /// it can perform reads/writes against them; it returns `Err` to abort
    /// the attempt without retrying.
    pub fn execute<F>(&self, participants: &mut [Box<dyn Participant>], mut work: F) -> Result<(), TxFailure>
    where
        F: FnMut(&Transaction, &mut [Box<dyn Participant>]) -> Result<(), String>,
    {
        let mut attempt = 0u32;
        loop {
            match self.try_once(participants, &mut work) {
                Ok(()) => return Ok(()),
                Err(TxFailure::Conflict) => {
                    attempt += 1;
                    match self.retry_policy.next_delay(attempt) {
                        Some(delay) => {
                            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after conflict");
                            thread::sleep(delay);
                        }
                        None => {
                            warn!(attempt, "giving up after exhausting retry policy");
                            return Err(TxFailure::Conflict);
                        }
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn try_once<F>(&self, participants: &mut [Box<dyn Participant>], work: &mut F) -> Result<(), TxFailure>
    where
        F: FnMut(&Transaction, &mut [Box<dyn Participant>]) -> Result<(), String>,
    {
        let tx = self.manager.start_short(None)?;
        for p in participants.iter_mut() {
            p.start(&tx);
        }

        if let Err(e) = work(&tx, participants) {
            self.rollback_all(participants, &tx)?;
            return Err(TxFailure::Work(e));
        }

        let changes = participants.iter().flat_map(|p| p.get_changes()).collect();
        if !self.manager.can_commit(&tx, changes)? {
            self.rollback_all(participants, &tx)?;
            return Err(TxFailure::Conflict);
        }

        for p in participants.iter_mut() {
            if !p.persist() {
                self.rollback_all(participants, &tx)?;
                return Err(TxFailure::PersistFailed);
            }
        }

        if !self.manager.commit(&tx)? {
            self.rollback_all(participants, &tx)?;
            return Err(TxFailure::Conflict);
        }

        let all_finalized = participants.iter_mut().fold(true, |ok, p| p.post_commit() && ok);
        if !all_finalized {
            warn!(tx_id = %tx.transaction_id, "a participant failed post-commit on an already-committed transaction");
            return Err(TxFailure::PostCommitFailed);
        }
        Ok(())
    }

    fn rollback_all(&self, participants: &mut [Box<dyn Participant>], tx: &Transaction) -> Result<(), TxFailure> {
        let all_rolled_back = participants.iter_mut().fold(true, |ok, p| p.rollback() && ok);
        if all_rolled_back {
            self.manager.abort(tx)?;
        } else {
            warn!(tx_id = %tx.transaction_id, "rollback failed on at least one participant, invalidating");
            self.manager.invalidate(tx.transaction_id)?;
        }
        Ok(())
    }
}
