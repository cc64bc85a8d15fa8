use tally_capability::CapabilityError;
use tally_identity::IdentityError;
use tally_ledger::LedgerError;
use tally_types::{ContractAddress, DenialReason};
use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Every failure carries its specific kind; denials are never collapsed into
/// a generic error. Any error means the call committed nothing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown contract address: {0}")]
    UnknownContract(ContractAddress),

    #[error("call proof rejected: {0}")]
    Proof(#[from] IdentityError),

    #[error("authorization denied: {0}")]
    Denied(DenialReason),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("engine state lock poisoned")]
    StatePoisoned,
}
