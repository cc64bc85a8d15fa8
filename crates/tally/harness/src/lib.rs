//! Tally Harness - a deterministic, in-process driver for the engine.
//!
//! The simulator sequences calls into the [`Engine`] exactly the way the
//! excluded submission layer would — one committed mutation at a time — and
//! exposes the resulting ledger/capability state for verification. No network
//! and no proving step anywhere.
//!
//! Participant keypairs come from a seeded RNG, so a given seed always
//! produces the same cast of identities. The harness also stands in for the
//! excluded asset layer: each participant carries a native-asset balance that
//! is debited when a permission token is bought.

#![deny(unsafe_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use tally_capability::{CapabilityEvidence, PermissionToken};
use tally_engine::{Engine, EngineError, StateSnapshot};
use tally_engine::calls;
use tally_identity::Keypair;
use tally_types::{AssetAmount, ContractAddress, DenialReason, PolicyConfig, PublicId};
use thiserror::Error;

const DEFAULT_SEED: u64 = 0x7a11;

/// A participant in the simulation: a keypair, a native-asset balance, and
/// the permission tokens it currently holds.
pub struct Participant {
    keypair: Keypair,
    public_id: PublicId,
    balance: AssetAmount,
    tokens: Vec<PermissionToken>,
}

impl Participant {
    pub fn public_id(&self) -> PublicId {
        self.public_id
    }

    pub fn balance(&self) -> AssetAmount {
        self.balance
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// The deterministic driver.
pub struct Simulator {
    engine: Engine,
    rng: StdRng,
}

impl Simulator {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            engine: Engine::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Direct access to the engine under test.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Spawn a participant with no asset balance.
    pub fn participant(&mut self) -> Participant {
        self.funded_participant(0)
    }

    /// Spawn a participant endowed with `balance` of the native asset.
    pub fn funded_participant(&mut self, balance: AssetAmount) -> Participant {
        let keypair = Keypair::generate(&mut self.rng);
        let public_id = keypair.public_id();
        Participant {
            keypair,
            public_id,
            balance,
            tokens: Vec::new(),
        }
    }

    /// Deploy a contract on behalf of `deployer`.
    pub fn deploy(
        &self,
        deployer: &Participant,
        config: PolicyConfig,
    ) -> Result<ContractAddress, HarnessError> {
        let receipt = self.engine.deploy(&deployer.public_id, config)?;
        Ok(receipt.address)
    }

    /// Have `deployer` grant `grantee` a permit.
    pub fn grant(
        &self,
        address: &ContractAddress,
        deployer: &Participant,
        grantee: &Participant,
    ) -> Result<(), HarnessError> {
        let proof = deployer.keypair.sign_call(
            address,
            calls::OP_GRANT_PERMIT,
            &calls::grant_payload(&grantee.public_id),
        );
        self.engine
            .grant_permit(address, &proof, &grantee.public_id)?;
        Ok(())
    }

    /// Have `buyer` purchase one permission token, paying `payment`.
    ///
    /// The buyer's balance must cover the payment (the asset layer's check);
    /// the engine then decides whether the payment satisfies the price. The
    /// balance is debited only when the purchase commits.
    pub fn buy_permission(
        &self,
        address: &ContractAddress,
        buyer: &mut Participant,
        payment: AssetAmount,
    ) -> Result<(), HarnessError> {
        if buyer.balance < payment {
            return Err(HarnessError::InsufficientFunds {
                balance: buyer.balance,
                payment,
            });
        }

        let proof = buyer.keypair.sign_call(
            address,
            calls::OP_BUY_PERMISSION,
            &calls::buy_payload(payment),
        );
        let token = self.engine.buy_permission(address, &proof, payment)?;

        buyer.balance -= payment;
        buyer.tokens.push(token);
        Ok(())
    }

    /// Have `caller` attempt an increment of `amount`.
    ///
    /// Under the token policy the caller spends one held token per call; a
    /// caller with none presents no evidence and is denied by the contract,
    /// not by the harness.
    pub fn increase(
        &self,
        address: &ContractAddress,
        caller: &mut Participant,
        amount: u128,
    ) -> Result<u128, HarnessError> {
        let evidence = match caller.tokens.pop() {
            Some(token) => CapabilityEvidence::Token(token),
            None => CapabilityEvidence::None,
        };
        let proof = caller.keypair.sign_call(
            address,
            calls::OP_INCREASE_COUNTER,
            &calls::increment_payload(amount, &evidence),
        );
        let value = self
            .engine
            .increase_counter(address, &proof, evidence, amount)?;
        Ok(value)
    }

    /// The committed counter value of a deployed contract.
    pub fn counter(&self, address: &ContractAddress) -> Result<u128, HarnessError> {
        match self.engine.query_state(address)? {
            Some(snapshot) => Ok(snapshot.counter),
            None => Err(HarnessError::NotDeployed(address.clone())),
        }
    }

    /// Full committed snapshot of a deployed contract.
    pub fn snapshot(&self, address: &ContractAddress) -> Result<StateSnapshot, HarnessError> {
        match self.engine.query_state(address)? {
            Some(snapshot) => Ok(snapshot),
            None => Err(HarnessError::NotDeployed(address.clone())),
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors surfaced while driving a simulation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HarnessError {
    /// The asset layer refused the payment before it reached the engine.
    #[error("insufficient funds: balance {balance}, payment {payment}")]
    InsufficientFunds {
        balance: AssetAmount,
        payment: AssetAmount,
    },

    #[error("contract not found: {0}")]
    NotDeployed(ContractAddress),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl HarnessError {
    /// The authorization denial carried by this error, if that is what it is.
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            HarnessError::Engine(EngineError::Denied(reason)) => Some(*reason),
            _ => None,
        }
    }
}

/// Initialize tracing output for local runs (`RUST_LOG` controls the filter).
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}
