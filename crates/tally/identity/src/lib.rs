//! Tally Identity - participant keypairs and call proofs.
//!
//! A participant is an Ed25519 keypair. The public identifier is a one-way
//! hash of the verifying key (see [`PublicId`]); the engine never sees the
//! secret. Every state-changing call carries a [`CallProof`]: a signature
//! over a digest that binds the caller's identity to that exact call
//! (contract address, operation name, operation payload), so a proof for one
//! call cannot authorize another.

#![deny(unsafe_code)]

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tally_types::{ContractAddress, PublicId};
use thiserror::Error;
use zeroize::Zeroizing;

/// A participant's Ed25519 keypair. The signing half never leaves this type.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the given randomness source.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        Self {
            signing: SigningKey::generate(rng),
        }
    }

    /// Rebuild a keypair from a 32-byte secret seed.
    ///
    /// The seed copy is zeroized once the signing key has been derived.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let seed = Zeroizing::new(seed);
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The participant's public identifier (one-way hash of the verifying key).
    pub fn public_id(&self) -> PublicId {
        PublicId::derive(self.signing.verifying_key().as_bytes())
    }

    /// Sign one specific call, producing a proof the engine can verify.
    pub fn sign_call(
        &self,
        address: &ContractAddress,
        operation: &str,
        payload: &[u8],
    ) -> CallProof {
        let digest = call_digest(address, operation, payload);
        let signature = self.signing.sign(&digest);
        CallProof {
            public_id: self.public_id(),
            verifying_key: self.signing.verifying_key(),
            signature,
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secret material.
        f.debug_struct("Keypair")
            .field("public_id", &self.public_id())
            .finish()
    }
}

/// Proof that the holder of a secret authorized one specific call.
///
/// Carries the verifying key and a signature over the call digest.
/// Verification checks both that the signature is valid and that the claimed
/// [`PublicId`] re-derives from the carried key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallProof {
    public_id: PublicId,
    verifying_key: VerifyingKey,
    signature: Signature,
}

impl CallProof {
    /// The identity this proof claims to act as.
    pub fn public_id(&self) -> &PublicId {
        &self.public_id
    }

    /// Verify this proof against the call it is presented for.
    pub fn verify(
        &self,
        address: &ContractAddress,
        operation: &str,
        payload: &[u8],
    ) -> Result<(), IdentityError> {
        if !self.public_id.verify_key(self.verifying_key.as_bytes()) {
            return Err(IdentityError::PublicIdMismatch);
        }

        let digest = call_digest(address, operation, payload);
        self.verifying_key
            .verify(&digest, &self.signature)
            .map_err(|_| IdentityError::SignatureInvalid)
    }
}

/// Compute the digest a call proof signs: BLAKE3 over the domain tag,
/// contract address, operation name, and operation payload, each
/// length-prefixed so field boundaries cannot be confused.
pub fn call_digest(address: &ContractAddress, operation: &str, payload: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"tally-call-v1:");
    hash_field(&mut hasher, address.0.as_bytes());
    hash_field(&mut hasher, operation.as_bytes());
    hash_field(&mut hasher, payload);
    *hasher.finalize().as_bytes()
}

fn hash_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    let len = bytes.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(bytes);
}

/// Identity-related errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("signature does not match the call digest")]
    SignatureInvalid,

    #[error("claimed public id does not derive from the presented key")]
    PublicIdMismatch,
}
