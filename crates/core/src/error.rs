//! Error types shared across the transaction coordinator workspace.
//!
//! We use `thiserror` for automatic `Display`/`Error` impls, the same way
//! every crate in this workspace reports failures. `Error` covers the
//! abstract kinds named in the spec; crates that need richer context
//! (WAL I/O, codec mismatches) define their own error enum and convert into
//! this one at the crate boundary via `#[from]`.

use crate::ids::TxId;
use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Abstract error kinds produced by the transaction manager and its
/// collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// A timeout or other argument was outside its allowed range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The named transaction is not in the in-progress set (never existed,
    /// or already aborted/invalidated/committed).
    #[error("transaction {0} is not in progress")]
    NotInProgress(TxId),

    /// `truncateInvalidTxBefore` found an in-progress transaction older
    /// than the requested cutoff.
    #[error("cannot truncate invalid list before {cutoff}: transaction {oldest} is still in progress")]
    InvalidTruncateTime {
        /// The requested cutoff, as a raw id prefix (time * MAX_TX_PER_MS).
        cutoff: u64,
        /// The oldest in-progress transaction blocking truncation.
        oldest: TxId,
    },

    /// I/O or codec error while exporting or loading a snapshot.
    #[error("snapshot failure: {0}")]
    SnapshotFailure(String),

    /// I/O error while appending to or reading the edit log.
    #[error("log failure: {0}")]
    LogFailure(String),
}
