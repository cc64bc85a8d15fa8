//! Tally Types - shared vocabulary for the permissioned counter system.
//!
//! Everything that crosses a crate boundary lives here: public identifiers,
//! contract addresses, token identifiers, policy configuration, and the
//! authorization denial vocabulary.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// PublicId — the public identifier of a participant.
///
/// Derived one-way from the participant's Ed25519 verifying key. The
/// identifier is the hash, not the key: holding a `PublicId` proves nothing,
/// and two identities are equal iff their identifiers are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicId {
    /// BLAKE3 hash of the domain-tagged verifying key.
    identity_hash: [u8; 32],
    /// Version of the derivation scheme.
    derivation_version: u8,
}

impl PublicId {
    /// Derive a public identifier from Ed25519 verifying key bytes.
    ///
    /// Deterministic and one-way: the key cannot be recovered from the
    /// identifier, and deriving twice from the same key yields the same id.
    pub fn derive(verifying_key: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        // Domain separation tag
        hasher.update(b"tally-identity-v1:");
        hasher.update(b"ed25519:");
        hasher.update(verifying_key);
        Self {
            identity_hash: *hasher.finalize().as_bytes(),
            derivation_version: 1,
        }
    }

    /// Verify that a verifying key re-derives to this identifier.
    pub fn verify_key(&self, verifying_key: &[u8; 32]) -> bool {
        let derived = Self::derive(verifying_key);
        self.identity_hash == derived.identity_hash
            && self.derivation_version == derived.derivation_version
    }

    /// Short display form (first 8 bytes hex).
    pub fn short_id(&self) -> String {
        hex::encode(&self.identity_hash[..8])
    }

    /// Access the raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.identity_hash
    }
}

impl std::fmt::Display for PublicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id:{}", self.short_id())
    }
}

/// Address of a deployed counter contract instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractAddress(pub String);

impl ContractAddress {
    /// Generate a fresh address for a new deployment.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a minted capability token.
///
/// Ids are minted only inside the capability store; validity is membership in
/// the contract's outstanding set, so an id alone cannot be forged into a
/// spendable capability.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantity of the native fungible asset.
pub type AssetAmount = u128;

/// Access-control regime selected at deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyConfig {
    /// Every identity is always authorized.
    Open,
    /// Deployer-curated permit list; membership is durable and reusable.
    PermitList,
    /// Permit list where each entry (deployer included) works exactly once.
    OneTime,
    /// Capability tokens purchased at a fixed price, consumed on use.
    Token { price: AssetAmount },
}

impl PolicyConfig {
    /// Stable name of the policy variant, for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PolicyConfig::Open => "open",
            PolicyConfig::PermitList => "permit-list",
            PolicyConfig::OneTime => "one-time",
            PolicyConfig::Token { .. } => "token",
        }
    }
}

/// Why an increment call was refused authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DenialReason {
    #[error("caller is not in the permit set")]
    NotPermitted,

    #[error("one-time permission already consumed")]
    AlreadyUsed,

    #[error("no valid outstanding token presented")]
    NoValidToken,
}

/// Hex encoding helpers (no external dep needed — small utility).
mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: &[u8]) -> String {
        let mut s = String::with_capacity(bytes.len() * 2);
        for &b in bytes {
            s.push(HEX_CHARS[(b >> 4) as usize] as char);
            s.push(HEX_CHARS[(b & 0xf) as usize] as char);
        }
        s
    }
}
