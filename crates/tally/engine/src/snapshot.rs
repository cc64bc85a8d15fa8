use serde::{Deserialize, Serialize};
use tally_capability::CapabilitySummary;
use tally_types::ContractAddress;

use crate::error::EngineError;

/// Committed state of one contract as read by the state query layer.
///
/// The query layer treats this as an opaque serialized blob keyed by the
/// contract address; the blob format is JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub address: ContractAddress,
    pub counter: u128,
    pub capabilities: CapabilitySummary,
}

impl StateSnapshot {
    pub fn to_blob(&self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec(self).map_err(|err| EngineError::Serialization(err.to_string()))
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self, EngineError> {
        serde_json::from_slice(blob).map_err(|err| EngineError::Serialization(err.to_string()))
    }
}
