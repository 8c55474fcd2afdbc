//! Client-side transaction orchestrator (spec §4.4).
//!
//! Wraps a `txn_manager::TransactionManager` with the lifecycle harness a
//! client uses to drive a unit of work across multiple participants:
//! start → change collection → `canCommit` → persist → `commit` →
//! post-commit → (rollback|invalidate), retrying only on conflict.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod orchestrator;
mod participant;
mod retry;

pub use orchestrator::{TxFailure, TxOrchestrator};
pub use participant::Participant;
pub use retry::{ExponentialBackoff, NoRetry, RetryPolicy};
