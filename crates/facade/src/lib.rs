//! The façade (spec §4.4): a thin RPC-shaped surface in front of the
//! transaction manager, plus client-side endpoint discovery.
//!
//! `Facade` owns no state of its own beyond the shared
//! `txn_manager::TransactionManager` — it exists so that a transport
//! layer only has to serialize `Request`/`Response` and never touch the
//! manager directly. `discovery` is the client-side counterpart: picking
//! which façade endpoint to talk to.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod discovery;
mod facade;

pub use discovery::{pick_endpoint_blocking, pick_one, Discovery, StaticDiscovery};
pub use facade::{Facade, Request, Response};
