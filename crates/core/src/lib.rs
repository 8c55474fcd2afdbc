//! Core types for the transaction coordinator
//!
//! This crate defines the data the rest of the workspace agrees on:
//!
//! - `ids`: transaction identifiers, change ids, the `MAX_TX_PER_MS` constant
//! - `transaction`: the `Transaction` view handed to clients and the
//!   manager-internal `InProgressTx`
//! - `edit`: the durable edit-log alphabet (`Edit`)
//! - `snapshot`: the full-state `TransactionSnapshot` DTO
//! - `config`: recognized configuration keys (spec §6) and their validation
//! - `error`: the abstract error kinds shared by every crate in the
//!   workspace
//!
//! Nothing in this crate touches disk or threads; it is the vocabulary the
//! durability and manager crates are built from.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod edit;
pub mod error;
pub mod ids;
pub mod snapshot;
pub mod transaction;

pub use config::ManagerConfig;
pub use edit::Edit;
pub use error::{Error, Result};
pub use ids::{ChangeId, TxId, MAX_TX_PER_MS};
pub use snapshot::TransactionSnapshot;
pub use transaction::{InProgressTx, Transaction, TxType};
