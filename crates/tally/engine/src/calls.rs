//! Call descriptors shared by the engine and its callers.
//!
//! A call proof signs a digest over (address, operation name, payload). The
//! payload builders here are the single source of truth for how each
//! operation's arguments are bound into that digest; the engine recomputes
//! the same bytes when verifying.

use tally_capability::CapabilityEvidence;
use tally_types::PublicId;

pub const OP_GRANT_PERMIT: &str = "grant_permit";
pub const OP_BUY_PERMISSION: &str = "buy_permission";
pub const OP_INCREASE_COUNTER: &str = "increase_counter";

/// Payload bound into a `grant_permit` proof.
pub fn grant_payload(grantee: &PublicId) -> Vec<u8> {
    grantee.as_bytes().to_vec()
}

/// Payload bound into a `buy_permission` proof.
pub fn buy_payload(payment: u128) -> Vec<u8> {
    payment.to_le_bytes().to_vec()
}

/// Payload bound into an `increase_counter` proof: the amount, plus the
/// presented token id when the evidence carries one, so a proof cannot be
/// replayed with someone else's token.
pub fn increment_payload(amount: u128, evidence: &CapabilityEvidence) -> Vec<u8> {
    let mut payload = amount.to_le_bytes().to_vec();
    if let Some(id) = evidence.token_id() {
        payload.extend_from_slice(id.0.as_bytes());
    }
    payload
}
