//! Tally Ledger - the counter value and its query-layer snapshot.
//!
//! The ledger is a single non-negative integer that only ever increases, and
//! only through [`CounterLedger::apply_increment`]. There is no decrement or
//! reset surface at all; monotonicity is structural, not policed.

#![deny(unsafe_code)]

pub mod error;

pub use error::LedgerError;

use serde::{Deserialize, Serialize};

/// The counter state of one deployed contract. Created at zero; mutated only
/// by the engine as the effect of an authorized increment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterLedger {
    counter: u128,
}

impl CounterLedger {
    /// A fresh ledger with `counter = 0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed counter value.
    pub fn value(&self) -> u128 {
        self.counter
    }

    /// Add `amount` to the counter and return the new value.
    ///
    /// `amount = 0` is accepted and leaves the value unchanged. Overflow is a
    /// checked error; the ledger is untouched when it occurs.
    pub fn apply_increment(&mut self, amount: u128) -> Result<u128, LedgerError> {
        let next = self
            .counter
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                current: self.counter,
                amount,
            })?;
        self.counter = next;
        Ok(next)
    }

    /// Snapshot of the committed value for the state query layer.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            counter: self.counter,
        }
    }
}

/// Committed counter value as read by the (external) state query layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub counter: u128,
}

impl LedgerSnapshot {
    /// Serialize to the opaque blob the query layer stores per address.
    pub fn to_blob(&self) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(self).map_err(|err| LedgerError::Serialization(err.to_string()))
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(blob).map_err(|err| LedgerError::Serialization(err.to_string()))
    }
}
