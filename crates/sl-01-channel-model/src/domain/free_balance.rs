//! # Free Balance
//!
//! The channel's always-installed balance-tracking application. Its state
//! is a token-indexed map of owner balances plus the set of active app
//! identity hashes whose collateral is currently carved out of it.
//!
//! Owner order inside the serialized state is fixed to the channel's
//! multisig owner order; token iteration order is irrelevant to equality.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use shared_types::{Address, Bytes32, CoinTransfer, TokenIndexedBalances, U256};

use super::errors::ChannelError;

/// Solidity encoding of the free balance app state.
pub const FREE_BALANCE_STATE_ENCODING: &str =
    "tuple(address[] tokenAddresses, tuple(address to, uint256 amount)[][] balances, bytes32[] activeApps)";

/// Serialized free balance app state document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeBalanceStateJson {
    pub token_addresses: Vec<Address>,
    /// Outer index parallels `token_addresses`; inner order parallels the
    /// multisig owners.
    pub balances: Vec<Vec<CoinTransfer>>,
    pub active_apps: Vec<Bytes32>,
}

/// Typed view over the free balance app state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBalance {
    /// Multisig owner addresses in channel order; fixes serialization
    /// order of per-token balance lists.
    owners: Vec<Address>,
    balances: TokenIndexedBalances,
    active_apps: BTreeSet<Bytes32>,
}

impl FreeBalance {
    /// A free balance funding each owner with `amount` for every token.
    ///
    /// Fails unless exactly two owners are given.
    pub fn create_with_funded_token_amounts(
        owners: Vec<Address>,
        amount: U256,
        token_addresses: Vec<Address>,
    ) -> Result<Self, ChannelError> {
        if owners.len() != 2 {
            return Err(ChannelError::InvalidOwnerCount {
                actual: owners.len(),
            });
        }
        let mut balances: TokenIndexedBalances = BTreeMap::new();
        for token in token_addresses {
            let entry = balances.entry(token).or_default();
            for owner in &owners {
                entry.insert(*owner, amount);
            }
        }
        Ok(Self {
            owners,
            balances,
            active_apps: BTreeSet::new(),
        })
    }

    /// A zero-funded free balance for freshly set-up channels.
    pub fn create_empty(owners: Vec<Address>) -> Result<Self, ChannelError> {
        Self::create_with_funded_token_amounts(owners, U256::zero(), vec![])
    }

    /// The multisig owners in channel order.
    #[must_use]
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Balance for `(token, owner)`; zero for anything untracked.
    #[must_use]
    pub fn get_balance(&self, token_address: &Address, owner: &Address) -> U256 {
        self.balances
            .get(token_address)
            .and_then(|owners| owners.get(owner))
            .copied()
            .unwrap_or_else(U256::zero)
    }

    /// Full `{token: {owner: amount}}` view; used for diffing and
    /// equality checks.
    #[must_use]
    pub fn to_token_indexed_map(&self) -> TokenIndexedBalances {
        self.balances.clone()
    }

    /// Identity hashes of apps currently funded out of this free balance.
    #[must_use]
    pub fn active_apps(&self) -> impl Iterator<Item = &Bytes32> {
        self.active_apps.iter()
    }

    /// Credit each `(token, owner)` entry.
    #[must_use]
    pub fn increment(&self, increments: &TokenIndexedBalances) -> Self {
        let mut next = self.clone();
        for (token, owners) in increments {
            let entry = next.balances.entry(*token).or_default();
            for (owner, amount) in owners {
                let current = entry.get(owner).copied().unwrap_or_else(U256::zero);
                entry.insert(*owner, current.saturating_add(*amount));
            }
        }
        next
    }

    /// Debit each `(token, owner)` entry.
    ///
    /// Fails with `InsufficientBalance` if any resulting balance would go
    /// negative; balances never go negative.
    pub fn decrement(
        &self,
        multisig_address: Address,
        decrements: &TokenIndexedBalances,
    ) -> Result<Self, ChannelError> {
        let mut next = self.clone();
        for (token, owners) in decrements {
            for (owner, amount) in owners {
                let available = next.get_balance(token, owner);
                if available < *amount {
                    return Err(ChannelError::InsufficientBalance {
                        multisig_address,
                        token_address: *token,
                        owner: *owner,
                        required: *amount,
                        available,
                    });
                }
                next.balances
                    .entry(*token)
                    .or_default()
                    .insert(*owner, available - *amount);
            }
        }
        Ok(next)
    }

    /// Record an app as funded out of this free balance.
    #[must_use]
    pub fn register_app(&self, identity_hash: Bytes32) -> Self {
        let mut next = self.clone();
        next.active_apps.insert(identity_hash);
        next
    }

    /// Remove an app from the funded set.
    #[must_use]
    pub fn release_app(&self, identity_hash: &Bytes32) -> Self {
        let mut next = self.clone();
        next.active_apps.remove(identity_hash);
        next
    }

    /// Serialize into the opaque app state document, with per-token
    /// balance lists in multisig owner order.
    #[must_use]
    pub fn to_app_state(&self) -> Value {
        let token_addresses: Vec<Address> = self.balances.keys().copied().collect();
        let balances = token_addresses
            .iter()
            .map(|token| {
                self.owners
                    .iter()
                    .map(|owner| CoinTransfer {
                        to: *owner,
                        amount: self.get_balance(token, owner),
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let state = FreeBalanceStateJson {
            token_addresses,
            balances,
            active_apps: self.active_apps.iter().copied().collect(),
        };
        serde_json::to_value(state).unwrap_or(Value::Null)
    }

    /// Parse back from the opaque app state document.
    pub fn from_app_state(owners: Vec<Address>, state: &Value) -> Result<Self, ChannelError> {
        if owners.len() != 2 {
            return Err(ChannelError::InvalidOwnerCount {
                actual: owners.len(),
            });
        }
        let parsed: FreeBalanceStateJson = serde_json::from_value(state.clone())
            .map_err(|e| ChannelError::MalformedAppState(e.to_string()))?;
        if parsed.balances.len() != parsed.token_addresses.len() {
            return Err(ChannelError::MalformedAppState(format!(
                "{} balance lists for {} tokens",
                parsed.balances.len(),
                parsed.token_addresses.len()
            )));
        }
        let mut balances: TokenIndexedBalances = BTreeMap::new();
        for (token, transfers) in parsed.token_addresses.iter().zip(&parsed.balances) {
            let entry = balances.entry(*token).or_default();
            for transfer in transfers {
                entry.insert(transfer.to, transfer.amount);
            }
        }
        Ok(Self {
            owners,
            balances,
            active_apps: parsed.active_apps.into_iter().collect(),
        })
    }
}
