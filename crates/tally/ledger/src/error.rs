use thiserror::Error;

/// Errors returned by the counter ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("increment of {amount} would overflow the counter at {current}")]
    Overflow { current: u128, amount: u128 },

    #[error("serialization error: {0}")]
    Serialization(String),
}
