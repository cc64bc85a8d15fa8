//! Tally Engine - the permissioned-increment state machine.
//!
//! This crate provides:
//! - the [`Engine`], hosting deployed counter contracts keyed by address
//! - the transactional authorize → consume → mutate increment path
//! - proof-checked administrative calls (`grant_permit`, `buy_permission`)
//! - committed-state snapshots for the (external) query layer
//!
//! Every mutation is an atomic, serializable transition over the full
//! contract state: a denied or failed call commits nothing.

#![deny(unsafe_code)]

pub mod calls;
pub mod engine;
pub mod error;
pub mod snapshot;

pub use engine::{DeployReceipt, Engine};
pub use error::EngineError;
pub use snapshot::StateSnapshot;

// Bearer-capability types presented with increment calls.
pub use tally_capability::{CapabilityEvidence, PermissionToken};
