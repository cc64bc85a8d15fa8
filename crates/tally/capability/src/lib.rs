//! Tally Capability - the per-policy capability store.
//!
//! The store tracks who (or what) currently holds the right to increment the
//! counter, under one of four access-control regimes. State is a tagged enum
//! with per-variant records, so each policy's authorization/consumption
//! contract is checked at compile time.
//!
//! `authorize` never mutates; `consume` is applied by the engine only as part
//! of a successful increment, on a scratch copy that is committed together
//! with the counter update.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tally_types::{AssetAmount, DenialReason, PolicyConfig, PublicId, TokenId};
use thiserror::Error;

/// Capability state of one deployed contract, shaped by its policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityStore {
    /// No bookkeeping; every identity is always authorized.
    Open,
    /// Deployer-curated permit set; membership is durable and reusable.
    PermitList(PermitListState),
    /// Permit set where every entry, the deployer's included, works once.
    OneTime(OneTimeState),
    /// Outstanding bearer tokens purchased at a fixed price.
    Token(TokenState),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitListState {
    deployer: PublicId,
    permits: HashMap<PublicId, PermitRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitRecord {
    pub granted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeState {
    deployer: PublicId,
    deployer_slot: UsageState,
    permits: HashMap<PublicId, OneTimeRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeRecord {
    pub granted_at: DateTime<Utc>,
    pub usage: UsageState,
}

/// Whether a one-time permission has been spent. `Used` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageState {
    Unused,
    Used,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    price: AssetAmount,
    outstanding: HashMap<TokenId, TokenRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub minted_at: DateTime<Utc>,
}

/// A minted bearer capability.
///
/// Move-only by design: there is no `Clone` and no public constructor, so the
/// only way to hold one is to have bought it (or been handed it), and
/// presenting it to an increment call gives it up.
#[derive(Debug, PartialEq, Eq)]
pub struct PermissionToken {
    id: TokenId,
}

impl PermissionToken {
    pub fn id(&self) -> &TokenId {
        &self.id
    }
}

/// Capability material presented alongside an increment call.
#[derive(Debug)]
pub enum CapabilityEvidence {
    /// Identity-based policies need nothing beyond the call proof.
    None,
    /// Token policy: the bearer token being spent.
    Token(PermissionToken),
}

impl CapabilityEvidence {
    /// The token id being presented, if any (bound into the call digest).
    pub fn token_id(&self) -> Option<&TokenId> {
        match self {
            CapabilityEvidence::None => None,
            CapabilityEvidence::Token(token) => Some(token.id()),
        }
    }
}

impl CapabilityStore {
    /// Build the initial store for a fresh deployment.
    ///
    /// Permit-list and one-time record the deployer as implicitly privileged;
    /// the token policy records no identity at all.
    pub fn for_policy(config: &PolicyConfig, deployer: &PublicId) -> Self {
        match config {
            PolicyConfig::Open => CapabilityStore::Open,
            PolicyConfig::PermitList => CapabilityStore::PermitList(PermitListState {
                deployer: *deployer,
                permits: HashMap::new(),
            }),
            PolicyConfig::OneTime => CapabilityStore::OneTime(OneTimeState {
                deployer: *deployer,
                deployer_slot: UsageState::Unused,
                permits: HashMap::new(),
            }),
            PolicyConfig::Token { price } => CapabilityStore::Token(TokenState {
                price: *price,
                outstanding: HashMap::new(),
            }),
        }
    }

    /// Stable name of the active policy, for logs and error messages.
    pub fn policy_name(&self) -> &'static str {
        match self {
            CapabilityStore::Open => "open",
            CapabilityStore::PermitList(_) => "permit-list",
            CapabilityStore::OneTime(_) => "one-time",
            CapabilityStore::Token(_) => "token",
        }
    }

    /// Check whether `caller` may increment, given the presented evidence.
    ///
    /// Read-only: a denial leaves the store untouched by construction.
    pub fn authorize(
        &self,
        caller: &PublicId,
        evidence: &CapabilityEvidence,
    ) -> Result<(), DenialReason> {
        match self {
            CapabilityStore::Open => Ok(()),
            CapabilityStore::PermitList(state) => {
                if *caller == state.deployer || state.permits.contains_key(caller) {
                    Ok(())
                } else {
                    Err(DenialReason::NotPermitted)
                }
            }
            CapabilityStore::OneTime(state) => {
                if *caller == state.deployer {
                    return match state.deployer_slot {
                        UsageState::Unused => Ok(()),
                        UsageState::Used => Err(DenialReason::AlreadyUsed),
                    };
                }
                match state.permits.get(caller) {
                    Some(record) => match record.usage {
                        UsageState::Unused => Ok(()),
                        UsageState::Used => Err(DenialReason::AlreadyUsed),
                    },
                    None => Err(DenialReason::NotPermitted),
                }
            }
            CapabilityStore::Token(state) => match evidence.token_id() {
                Some(id) if state.outstanding.contains_key(id) => Ok(()),
                _ => Err(DenialReason::NoValidToken),
            },
        }
    }

    /// Spend the capability that authorized a successful increment.
    ///
    /// Called only after `authorize` succeeded on this exact state; the
    /// engine commits the result atomically with the counter update.
    pub fn consume(&mut self, caller: &PublicId, evidence: CapabilityEvidence) {
        match self {
            CapabilityStore::Open | CapabilityStore::PermitList(_) => {}
            CapabilityStore::OneTime(state) => {
                if *caller == state.deployer {
                    state.deployer_slot = UsageState::Used;
                } else if let Some(record) = state.permits.get_mut(caller) {
                    record.usage = UsageState::Used;
                }
            }
            CapabilityStore::Token(state) => {
                if let CapabilityEvidence::Token(token) = evidence {
                    state.outstanding.remove(token.id());
                }
            }
        }
    }

    /// Add `grantee` to the permit set. Deployer-only; idempotent.
    ///
    /// Under the one-time policy a re-grant never resets an entry that was
    /// already spent: `Used` is terminal.
    pub fn grant(&mut self, caller: &PublicId, grantee: PublicId) -> Result<(), CapabilityError> {
        match self {
            CapabilityStore::PermitList(state) => {
                if *caller != state.deployer {
                    return Err(CapabilityError::Unauthorized);
                }
                state.permits.entry(grantee).or_insert_with(|| PermitRecord {
                    granted_at: Utc::now(),
                });
                Ok(())
            }
            CapabilityStore::OneTime(state) => {
                if *caller != state.deployer {
                    return Err(CapabilityError::Unauthorized);
                }
                state.permits.entry(grantee).or_insert_with(|| OneTimeRecord {
                    granted_at: Utc::now(),
                    usage: UsageState::Unused,
                });
                Ok(())
            }
            CapabilityStore::Open | CapabilityStore::Token(_) => {
                Err(CapabilityError::UnsupportedOperation {
                    operation: "grant_permit",
                    policy: self.policy_name(),
                })
            }
        }
    }

    /// Mint one bearer token in exchange for exactly the fixed price.
    ///
    /// Open to any caller, the deployer included; the token policy privileges
    /// no identity.
    pub fn mint(&mut self, payment: AssetAmount) -> Result<PermissionToken, CapabilityError> {
        match self {
            CapabilityStore::Token(state) => {
                if payment != state.price {
                    return Err(CapabilityError::InsufficientPayment {
                        offered: payment,
                        price: state.price,
                    });
                }
                let id = TokenId::generate();
                state
                    .outstanding
                    .insert(id.clone(), TokenRecord { minted_at: Utc::now() });
                Ok(PermissionToken { id })
            }
            _ => Err(CapabilityError::UnsupportedOperation {
                operation: "buy_permission",
                policy: self.policy_name(),
            }),
        }
    }

    /// Deterministic, serialization-friendly view for state snapshots.
    pub fn summary(&self) -> CapabilitySummary {
        match self {
            CapabilityStore::Open => CapabilitySummary::Open,
            CapabilityStore::PermitList(state) => {
                let mut permitted: Vec<String> =
                    state.permits.keys().map(PublicId::short_id).collect();
                permitted.sort();
                CapabilitySummary::PermitList {
                    deployer: state.deployer.short_id(),
                    permitted,
                }
            }
            CapabilityStore::OneTime(state) => {
                let mut entries: Vec<OneTimeEntrySummary> = state
                    .permits
                    .iter()
                    .map(|(id, record)| OneTimeEntrySummary {
                        grantee: id.short_id(),
                        used: record.usage == UsageState::Used,
                    })
                    .collect();
                entries.sort_by(|a, b| a.grantee.cmp(&b.grantee));
                CapabilitySummary::OneTime {
                    deployer: state.deployer.short_id(),
                    deployer_used: state.deployer_slot == UsageState::Used,
                    entries,
                }
            }
            CapabilityStore::Token(state) => CapabilitySummary::Token {
                price: state.price,
                outstanding: state.outstanding.len(),
            },
        }
    }
}

/// Snapshot view of a capability store (short ids only, stable ordering).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilitySummary {
    Open,
    PermitList {
        deployer: String,
        permitted: Vec<String>,
    },
    OneTime {
        deployer: String,
        deployer_used: bool,
        entries: Vec<OneTimeEntrySummary>,
    },
    Token {
        price: AssetAmount,
        outstanding: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeEntrySummary {
    pub grantee: String,
    pub used: bool,
}

/// Errors raised by administrative capability operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("caller is not the deployer of this contract")]
    Unauthorized,

    #[error("payment of {offered} does not match the fixed price {price}")]
    InsufficientPayment {
        offered: AssetAmount,
        price: AssetAmount,
    },

    #[error("operation {operation} is not supported under the {policy} policy")]
    UnsupportedOperation {
        operation: &'static str,
        policy: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(tag: u8) -> PublicId {
        PublicId::derive(&[tag; 32])
    }

    #[test]
    fn open_authorizes_anyone_and_consumes_nothing() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::Open, &id(0));
        assert!(store.authorize(&id(9), &CapabilityEvidence::None).is_ok());

        let before = store.clone();
        store.consume(&id(9), CapabilityEvidence::None);
        assert_eq!(store, before);
    }

    #[test]
    fn permit_list_denies_strangers_and_admits_deployer() {
        let store = CapabilityStore::for_policy(&PolicyConfig::PermitList, &id(0));
        assert!(store.authorize(&id(0), &CapabilityEvidence::None).is_ok());
        assert_eq!(
            store.authorize(&id(1), &CapabilityEvidence::None),
            Err(DenialReason::NotPermitted)
        );
    }

    #[test]
    fn permit_list_grant_is_deployer_only_and_idempotent() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::PermitList, &id(0));

        assert_eq!(
            store.grant(&id(1), id(2)),
            Err(CapabilityError::Unauthorized)
        );

        store.grant(&id(0), id(2)).unwrap();
        let once = store.clone();
        store.grant(&id(0), id(2)).unwrap();
        assert_eq!(store, once);

        assert!(store.authorize(&id(2), &CapabilityEvidence::None).is_ok());
    }

    #[test]
    fn permit_list_membership_survives_consume() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::PermitList, &id(0));
        store.grant(&id(0), id(2)).unwrap();
        store.consume(&id(2), CapabilityEvidence::None);
        assert!(store.authorize(&id(2), &CapabilityEvidence::None).is_ok());
    }

    #[test]
    fn one_time_deployer_slot_is_spent_by_consume() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::OneTime, &id(0));
        assert!(store.authorize(&id(0), &CapabilityEvidence::None).is_ok());

        store.consume(&id(0), CapabilityEvidence::None);
        assert_eq!(
            store.authorize(&id(0), &CapabilityEvidence::None),
            Err(DenialReason::AlreadyUsed)
        );
    }

    #[test]
    fn one_time_grantee_is_spent_independently() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::OneTime, &id(0));
        store.grant(&id(0), id(1)).unwrap();
        store.grant(&id(0), id(2)).unwrap();

        store.consume(&id(1), CapabilityEvidence::None);
        assert_eq!(
            store.authorize(&id(1), &CapabilityEvidence::None),
            Err(DenialReason::AlreadyUsed)
        );
        assert!(store.authorize(&id(2), &CapabilityEvidence::None).is_ok());
        assert_eq!(
            store.authorize(&id(3), &CapabilityEvidence::None),
            Err(DenialReason::NotPermitted)
        );
    }

    #[test]
    fn one_time_regrant_never_resets_a_used_entry() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::OneTime, &id(0));
        store.grant(&id(0), id(1)).unwrap();
        store.consume(&id(1), CapabilityEvidence::None);

        store.grant(&id(0), id(1)).unwrap();
        assert_eq!(
            store.authorize(&id(1), &CapabilityEvidence::None),
            Err(DenialReason::AlreadyUsed)
        );
    }

    #[test]
    fn token_mint_requires_exact_price() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::Token { price: 100 }, &id(0));
        assert_eq!(
            store.mint(99),
            Err(CapabilityError::InsufficientPayment {
                offered: 99,
                price: 100
            })
        );
        assert_eq!(
            store.mint(101),
            Err(CapabilityError::InsufficientPayment {
                offered: 101,
                price: 100
            })
        );
        assert!(store.mint(100).is_ok());
    }

    #[test]
    fn token_authorization_is_bearer_based() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::Token { price: 5 }, &id(0));
        let token = store.mint(5).unwrap();

        // The deployer without a token is denied like anyone else.
        assert_eq!(
            store.authorize(&id(0), &CapabilityEvidence::None),
            Err(DenialReason::NoValidToken)
        );
        // Whoever presents the token is authorized, purchaser or not.
        let evidence = CapabilityEvidence::Token(token);
        assert!(store.authorize(&id(7), &evidence).is_ok());
    }

    #[test]
    fn token_is_gone_after_consume() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::Token { price: 5 }, &id(0));
        let token = store.mint(5).unwrap();
        let spent_id = token.id().clone();

        store.consume(&id(1), CapabilityEvidence::Token(token));

        let summary = store.summary();
        assert_eq!(
            summary,
            CapabilitySummary::Token {
                price: 5,
                outstanding: 0
            }
        );
        // A forged handle with the spent id would not exist; the id itself is
        // no longer outstanding either.
        match &store {
            CapabilityStore::Token(state) => assert!(!state.outstanding.contains_key(&spent_id)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn unsupported_operations_are_typed() {
        let mut open = CapabilityStore::for_policy(&PolicyConfig::Open, &id(0));
        assert!(matches!(
            open.grant(&id(0), id(1)),
            Err(CapabilityError::UnsupportedOperation {
                operation: "grant_permit",
                ..
            })
        ));

        let mut permit = CapabilityStore::for_policy(&PolicyConfig::PermitList, &id(0));
        assert!(matches!(
            permit.mint(10),
            Err(CapabilityError::UnsupportedOperation {
                operation: "buy_permission",
                ..
            })
        ));
    }

    #[test]
    fn summary_ordering_is_stable() {
        let mut store = CapabilityStore::for_policy(&PolicyConfig::PermitList, &id(0));
        store.grant(&id(0), id(3)).unwrap();
        store.grant(&id(0), id(1)).unwrap();
        store.grant(&id(0), id(2)).unwrap();
        assert_eq!(store.summary(), store.summary());
    }
}
