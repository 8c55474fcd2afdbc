//! RPC-shaped dispatcher in front of the `TransactionManager` (spec §4.4).
//!
//! `Facade` translates each `Request` into exactly one manager operation —
//! no business logic of its own — so that a real transport (gRPC, Thrift,
//! a bespoke framed protocol) only has to serialize `Request`/`Response`
//! and call `dispatch`.

use std::sync::Arc;

use txn_core::ids::TxId;
use txn_core::transaction::Transaction;
use txn_core::{ChangeId, Error, Result, TransactionSnapshot};
use txn_manager::{ManagerStatus, TransactionManager};

/// One façade call. Maps one-to-one onto a `TransactionManager` method.
#[derive(Debug, Clone)]
pub enum Request {
    /// Start a SHORT transaction, with an optional timeout override.
    StartShort {
        /// Timeout in seconds; `None` uses the configured default.
        timeout_seconds: Option<u64>,
    },
    /// Start a LONG transaction.
    StartLong,
    /// Allocate a new write pointer for an in-progress transaction.
    Checkpoint {
        /// The transaction to checkpoint.
        tx: Transaction,
    },
    /// Propose a change set for conflict checking.
    CanCommit {
        /// The transaction proposing the changes.
        tx: Transaction,
        /// The keys it touched.
        change_ids: Vec<ChangeId>,
    },
    /// Finalize a commit.
    Commit {
        /// The transaction to commit.
        tx: Transaction,
    },
    /// Abort a transaction.
    Abort {
        /// The transaction to abort.
        tx: Transaction,
    },
    /// Mark a transaction id invalid.
    Invalidate {
        /// The id to invalidate.
        id: TxId,
    },
    /// Remove the given ids from the invalid list.
    TruncateInvalidTx {
        /// The ids to remove, if present.
        ids: Vec<TxId>,
    },
    /// Remove invalid ids older than a cutoff.
    TruncateInvalidTxBefore {
        /// Epoch-millis cutoff.
        cutoff_millis: u64,
    },
    /// Size of the invalid list.
    GetInvalidSize,
    /// Drop committed change sets that can no longer conflict.
    PruneNow,
    /// Administrative reset of all manager state.
    ResetState,
    /// Point-in-time counts and watermarks.
    Status,
    /// Export a consistent snapshot of current state.
    GetSnapshotInputStream,
}

/// The result of dispatching a `Request`.
#[derive(Debug, Clone)]
pub enum Response {
    /// A transaction handle, returned by start/checkpoint.
    Transaction(Transaction),
    /// A boolean outcome (canCommit/commit/invalidate/truncate).
    Bool(bool),
    /// A count (getInvalidSize/expireTimedOut).
    Count(usize),
    /// Manager status.
    Status(ManagerStatus),
    /// A state snapshot.
    Snapshot(TransactionSnapshot),
    /// No payload (abort/pruneNow/resetState).
    Unit,
}

/// Dispatches `Request`s against a shared `TransactionManager`.
pub struct Facade {
    manager: Arc<TransactionManager>,
}

impl Facade {
    /// Wrap a manager behind the façade.
    pub fn new(manager: Arc<TransactionManager>) -> Self {
        Facade { manager }
    }

    /// Translate `request` into the one manager call it names.
    pub fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::StartShort { timeout_seconds } => {
                self.manager.start_short(timeout_seconds).map(Response::Transaction)
            }
            Request::StartLong => self.manager.start_long().map(Response::Transaction),
            Request::Checkpoint { tx } => self.manager.checkpoint(&tx).map(Response::Transaction),
            Request::CanCommit { tx, change_ids } => {
                self.manager.can_commit(&tx, change_ids).map(Response::Bool)
            }
            Request::Commit { tx } => self.manager.commit(&tx).map(Response::Bool),
            Request::Abort { tx } => self.manager.abort(&tx).map(|()| Response::Unit),
            Request::Invalidate { id } => self.manager.invalidate(id).map(Response::Bool),
            Request::TruncateInvalidTx { ids } => {
                self.manager.truncate_invalid_tx(&ids).map(Response::Bool)
            }
            Request::TruncateInvalidTxBefore { cutoff_millis } => self
                .manager
                .truncate_invalid_tx_before(cutoff_millis)
                .map(Response::Bool),
            Request::GetInvalidSize => Ok(Response::Count(self.manager.get_invalid_size())),
            Request::PruneNow => {
                self.manager.prune_now();
                Ok(Response::Unit)
            }
            Request::ResetState => self.manager.reset_state().map(|()| Response::Unit),
            Request::Status => Ok(Response::Status(self.manager.status())),
            Request::GetSnapshotInputStream => {
                Ok(Response::Snapshot(self.manager.get_snapshot_input_stream()))
            }
        }
    }
}

/// Helper to pull a `Transaction` out of a `Response`, for callers that
/// know which variant a given request produces.
impl Response {
    /// Unwrap a `Transaction` response, or `Error::InvalidArgument` if the
    /// response was a different variant.
    pub fn into_transaction(self) -> Result<Transaction> {
        match self {
            Response::Transaction(tx) => Ok(tx),
            _ => Err(Error::InvalidArgument("expected a Transaction response".to_string())),
        }
    }

    /// Unwrap a `bool` response.
    pub fn into_bool(self) -> Result<bool> {
        match self {
            Response::Bool(b) => Ok(b),
            _ => Err(Error::InvalidArgument("expected a Bool response".to_string())),
        }
    }
}
