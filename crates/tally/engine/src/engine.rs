use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tally_capability::{CapabilityEvidence, CapabilityStore, PermissionToken};
use tally_identity::CallProof;
use tally_ledger::CounterLedger;
use tally_types::{AssetAmount, ContractAddress, PolicyConfig, PublicId};
use tracing::{debug, info};

use crate::calls;
use crate::error::EngineError;
use crate::snapshot::StateSnapshot;

/// The state machine engine.
///
/// Hosts deployed counter contracts keyed by address and applies one mutation
/// at a time: verify the call proof, authorize against the capability store,
/// then commit the capability consumption and the counter update together or
/// not at all. Writers are serialized behind the state lock; validation and
/// mutation are pure, synchronous, in-memory computations.
pub struct Engine {
    inner: RwLock<EngineState>,
}

#[derive(Default)]
struct EngineState {
    contracts: HashMap<ContractAddress, ContractState>,
}

struct ContractState {
    deployed_at: DateTime<Utc>,
    ledger: CounterLedger,
    capabilities: CapabilityStore,
}

/// What a caller gets back from a successful deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployReceipt {
    pub address: ContractAddress,
    pub initial_counter: u128,
    pub deployed_at: DateTime<Utc>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(EngineState::default()),
        }
    }

    /// Deploy a fresh contract under the given policy.
    ///
    /// Permit-list and one-time record `deployer` as implicitly privileged at
    /// creation time; the token policy records no identity privilege.
    pub fn deploy(
        &self,
        deployer: &PublicId,
        config: PolicyConfig,
    ) -> Result<DeployReceipt, EngineError> {
        let address = ContractAddress::generate();
        let deployed_at = Utc::now();
        let contract = ContractState {
            deployed_at,
            ledger: CounterLedger::new(),
            capabilities: CapabilityStore::for_policy(&config, deployer),
        };

        let mut state = self.write_state()?;
        state.contracts.insert(address.clone(), contract);

        info!(address = %address, policy = config.name(), deployer = %deployer, "contract deployed");
        Ok(DeployReceipt {
            address,
            initial_counter: 0,
            deployed_at,
        })
    }

    /// Add `grantee` to the contract's permit set (permit-list / one-time).
    ///
    /// The proof must bind the caller to this grant; only the deployer's
    /// identity is accepted. Idempotent for an already-listed grantee.
    pub fn grant_permit(
        &self,
        address: &ContractAddress,
        proof: &CallProof,
        grantee: &PublicId,
    ) -> Result<(), EngineError> {
        proof.verify(address, calls::OP_GRANT_PERMIT, &calls::grant_payload(grantee))?;

        let mut state = self.write_state()?;
        let contract = Self::contract_mut(&mut state, address)?;

        let mut next = contract.capabilities.clone();
        next.grant(proof.public_id(), *grantee)?;
        contract.capabilities = next;

        debug!(address = %address, grantee = %grantee, "permit granted");
        Ok(())
    }

    /// Mint one capability token in exchange for exactly the fixed price.
    ///
    /// Open to any identity, the deployer included. The returned token is a
    /// move-only bearer value; presenting it to `increase_counter` spends it.
    pub fn buy_permission(
        &self,
        address: &ContractAddress,
        proof: &CallProof,
        payment: AssetAmount,
    ) -> Result<PermissionToken, EngineError> {
        proof.verify(address, calls::OP_BUY_PERMISSION, &calls::buy_payload(payment))?;

        let mut state = self.write_state()?;
        let contract = Self::contract_mut(&mut state, address)?;

        let mut next = contract.capabilities.clone();
        let token = next.mint(payment)?;
        contract.capabilities = next;

        debug!(address = %address, buyer = %proof.public_id(), token = %token.id(), "permission token minted");
        Ok(token)
    }

    /// Increment the counter under the contract's policy.
    ///
    /// The capability consumption and the counter update are one transition:
    /// both are computed on scratch copies and committed together, so a
    /// failure at any step leaves the contract exactly as it was. A zero
    /// amount is a valid call and still consumes a capability where the
    /// policy consumes one.
    pub fn increase_counter(
        &self,
        address: &ContractAddress,
        proof: &CallProof,
        evidence: CapabilityEvidence,
        amount: u128,
    ) -> Result<u128, EngineError> {
        proof.verify(
            address,
            calls::OP_INCREASE_COUNTER,
            &calls::increment_payload(amount, &evidence),
        )?;
        let caller = *proof.public_id();

        let mut state = self.write_state()?;
        let contract = Self::contract_mut(&mut state, address)?;

        if let Err(reason) = contract.capabilities.authorize(&caller, &evidence) {
            debug!(address = %address, caller = %caller, %reason, "increment denied");
            return Err(EngineError::Denied(reason));
        }

        let mut next_ledger = contract.ledger.clone();
        let new_value = next_ledger.apply_increment(amount)?;
        let mut next_capabilities = contract.capabilities.clone();
        next_capabilities.consume(&caller, evidence);

        contract.ledger = next_ledger;
        contract.capabilities = next_capabilities;

        debug!(address = %address, caller = %caller, amount, counter = new_value, "counter incremented");
        Ok(new_value)
    }

    /// Read the committed state of a contract.
    ///
    /// Unknown addresses yield `None` rather than an error, matching the
    /// query layer's find-by-address semantics.
    pub fn query_state(
        &self,
        address: &ContractAddress,
    ) -> Result<Option<StateSnapshot>, EngineError> {
        let state = self.inner.read().map_err(|_| EngineError::StatePoisoned)?;
        match state.contracts.get(address) {
            Some(contract) => Ok(Some(StateSnapshot {
                address: address.clone(),
                counter: contract.ledger.value(),
                capabilities: contract.capabilities.summary(),
            })),
            None => {
                debug!(address = %address, "state queried for unknown contract");
                Ok(None)
            }
        }
    }

    /// When the contract was deployed, if it exists.
    pub fn deployed_at(
        &self,
        address: &ContractAddress,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        let state = self.inner.read().map_err(|_| EngineError::StatePoisoned)?;
        Ok(state.contracts.get(address).map(|c| c.deployed_at))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, EngineState>, EngineError> {
        self.inner.write().map_err(|_| EngineError::StatePoisoned)
    }

    fn contract_mut<'a>(
        state: &'a mut EngineState,
        address: &ContractAddress,
    ) -> Result<&'a mut ContractState, EngineError> {
        state
            .contracts
            .get_mut(address)
            .ok_or_else(|| EngineError::UnknownContract(address.clone()))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
