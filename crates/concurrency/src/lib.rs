//! Transaction manager: the state machine at the center of the coordinator
//! (spec §4.1, §4.2).
//!
//! - `conflict`: the write-write conflict rule (spec §4.2)
//! - `state`: `ManagerState`, the in-memory structure every operation
//!   mutates, plus `apply_edit`, the single function used both for live
//!   operations and for log replay during recovery
//! - `manager`: `TransactionManager`, the public API — one
//!   `parking_lot::Mutex<ManagerState>` guarding every transition, with the
//!   edit-log flush happening inside the critical section
//! - `sweep`: the periodic expiration scan

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conflict;
pub mod manager;
pub mod state;
pub mod sweep;

pub use manager::{ManagerStatus, TransactionManager};
pub use state::ManagerState;
