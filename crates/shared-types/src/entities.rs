//! # Core Channel Entities
//!
//! Defines the channel domain entities shared across subsystems.
//!
//! ## Clusters
//!
//! - **Identity**: `AppIdentity`, `AppInterface`, `AbiEncodings`
//! - **Outcomes**: `OutcomeType`, `InterpreterParams`, `CoinTransfer`
//! - **Channel documents**: `AppInstanceJson`, `StateChannelJson`
//! - **On-chain descriptors**: `MultisigTransaction`, `NetworkContext`
//! - **Dispute records**: `AppChallenge`
//!
//! Big-integer amounts are `U256` and serialize as `0x`-prefixed hex
//! strings; the persisted document never carries native numerics for
//! balances or timeouts.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::BTreeMap;

use crate::primitives::{Address, Bytes32, HexBytes, PublicIdentifier, SignatureBytes};

// Re-export U256 from primitive-types for use across all subsystems
pub use primitive_types::U256;

/// Token-indexed balances: `token address -> owner address -> amount`.
///
/// `BTreeMap` keys give deterministic iteration order for serialization
/// and diffing.
pub type TokenIndexedBalances = BTreeMap<Address, BTreeMap<Address, U256>>;

// =============================================================================
// CLUSTER A: APP IDENTITY
// =============================================================================

/// The immutable identity of an app instance.
///
/// Fixed once the app is proposed; `keccak256` of its deterministic
/// encoding is the app's identity hash and primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentity {
    /// Participant signer addresses in fixed (initiator, responder) order.
    pub participants: Vec<Address>,
    /// The multisig holding this channel's collateral.
    pub multisig_address: Address,
    /// On-chain app definition contract.
    pub app_definition: Address,
    /// Timeout used when a state is signed without an explicit timeout.
    pub default_timeout: U256,
    /// Channel-scoped nonce; equals the app's sequence number.
    pub channel_nonce: U256,
}

/// ABI encodings declared by an app definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEncodings {
    /// Solidity type of the app state.
    pub state_encoding: String,
    /// Solidity type of app actions; absent for stateless-action apps.
    pub action_encoding: Option<String>,
}

/// An app's on-chain interface: definition address plus declared encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInterface {
    /// App definition contract address.
    pub addr: Address,
    pub state_encoding: String,
    pub action_encoding: Option<String>,
}

// =============================================================================
// CLUSTER B: OUTCOMES
// =============================================================================

/// How an app's final state maps to a balance distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeType {
    TwoPartyFixedOutcome,
    SingleAssetTwoPartyCoinTransfer,
    MultiAssetMultiPartyCoinTransfer,
}

impl std::fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TwoPartyFixedOutcome => "TwoPartyFixedOutcome",
            Self::SingleAssetTwoPartyCoinTransfer => "SingleAssetTwoPartyCoinTransfer",
            Self::MultiAssetMultiPartyCoinTransfer => "MultiAssetMultiPartyCoinTransfer",
        };
        write!(f, "{name}")
    }
}

/// A single payout entry inside an app or free-balance state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinTransfer {
    pub to: Address,
    pub amount: U256,
}

/// Interpreter parameters, shaped by the app's outcome type.
///
/// Modeled as a tagged union so that construction-time validation can
/// enforce the `OutcomeType` pairing instead of runtime property probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InterpreterParams {
    #[serde(rename_all = "camelCase")]
    TwoPartyFixedOutcome {
        /// Exactly two player addresses.
        player_addrs: Vec<Address>,
        amount: U256,
    },
    #[serde(rename_all = "camelCase")]
    SingleAssetTwoPartyCoinTransfer {
        limit: U256,
        token_address: Address,
    },
    #[serde(rename_all = "camelCase")]
    MultiAssetMultiPartyCoinTransfer {
        limit: Vec<U256>,
        token_addresses: Vec<Address>,
    },
}

impl InterpreterParams {
    /// The outcome type this parameter shape belongs to.
    #[must_use]
    pub fn outcome_type(&self) -> OutcomeType {
        match self {
            Self::TwoPartyFixedOutcome { .. } => OutcomeType::TwoPartyFixedOutcome,
            Self::SingleAssetTwoPartyCoinTransfer { .. } => {
                OutcomeType::SingleAssetTwoPartyCoinTransfer
            }
            Self::MultiAssetMultiPartyCoinTransfer { .. } => {
                OutcomeType::MultiAssetMultiPartyCoinTransfer
            }
        }
    }
}

// =============================================================================
// CLUSTER C: CHANNEL DOCUMENTS
// =============================================================================

/// Persisted form of an app instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceJson {
    pub identity_hash: Bytes32,
    pub multisig_address: Address,
    pub initiator_identifier: PublicIdentifier,
    pub responder_identifier: PublicIdentifier,
    pub default_timeout: U256,
    pub app_interface: AppInterface,
    /// Strictly increasing per-channel sequence number.
    pub app_seq_no: u64,
    /// Deposit the app initiator funds at install.
    pub initiator_deposit: U256,
    pub initiator_deposit_token_address: Address,
    /// Deposit the app responder funds at install.
    pub responder_deposit: U256,
    pub responder_deposit_token_address: Address,
    /// Opaque app state document.
    pub latest_state: serde_json::Value,
    pub latest_version_number: u64,
    pub state_timeout: U256,
    pub outcome_type: OutcomeType,
    pub interpreter_params: InterpreterParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_action: Option<serde_json::Value>,
}

/// Critical deployment addresses pinned at channel setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAddresses {
    pub proxy_factory: Address,
    pub multisig_mastercopy: Address,
}

/// Persisted form of a state channel.
///
/// The app maps serialize as ordered arrays of `[identityHash, app]`
/// pairs, never JSON objects, so diffing and hashing are stable across
/// implementations.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChannelJson {
    pub schema_version: u64,
    pub multisig_address: Address,
    pub addresses: ChannelAddresses,
    /// `[initiator, responder]` in fixed order.
    pub user_identifiers: Vec<PublicIdentifier>,
    pub free_balance_app_instance: AppInstanceJson,
    #[serde_as(as = "Vec<(_, _)>")]
    pub app_instances: BTreeMap<Bytes32, AppInstanceJson>,
    #[serde_as(as = "Vec<(_, _)>")]
    pub proposed_app_instances: BTreeMap<Bytes32, AppInstanceJson>,
    pub monotonic_num_proposed_apps: u64,
}

// =============================================================================
// CLUSTER D: ON-CHAIN DESCRIPTORS
// =============================================================================

/// How the multisig executes a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultisigOperation {
    Call,
    DelegateCall,
}

impl MultisigOperation {
    /// On-chain encoding of the operation.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Call => 0,
            Self::DelegateCall => 1,
        }
    }
}

/// A transaction descriptor executable by the channel multisig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigTransaction {
    pub to: Address,
    pub value: U256,
    pub data: HexBytes,
    pub operation: MultisigOperation,
}

/// Deployed contract addresses for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkContext {
    pub proxy_factory: Address,
    pub multisig_mastercopy: Address,
    /// App definition backing every channel's free balance.
    pub identity_app: Address,
    pub challenge_registry: Address,
    /// Delegate target executing conditional and setup effects.
    pub conditional_transaction_delegate: Address,
    pub two_party_fixed_outcome_interpreter: Address,
    pub single_asset_two_party_coin_transfer_interpreter: Address,
    pub multi_asset_multi_party_coin_transfer_interpreter: Address,
}

impl NetworkContext {
    /// Interpreter contract responsible for the given outcome type.
    #[must_use]
    pub fn interpreter_address(&self, outcome_type: OutcomeType) -> Address {
        match outcome_type {
            OutcomeType::TwoPartyFixedOutcome => self.two_party_fixed_outcome_interpreter,
            OutcomeType::SingleAssetTwoPartyCoinTransfer => {
                self.single_asset_two_party_coin_transfer_interpreter
            }
            OutcomeType::MultiAssetMultiPartyCoinTransfer => {
                self.multi_asset_multi_party_coin_transfer_interpreter
            }
        }
    }

    /// Critical addresses pinned into a channel at setup.
    #[must_use]
    pub fn channel_addresses(&self) -> ChannelAddresses {
        ChannelAddresses {
            proxy_factory: self.proxy_factory,
            multisig_mastercopy: self.multisig_mastercopy,
        }
    }
}

// =============================================================================
// CLUSTER E: COMMITMENT DOCUMENTS
// =============================================================================

/// Persisted form of a set-state commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStateCommitmentJson {
    pub app_identity: AppIdentity,
    pub app_identity_hash: Bytes32,
    pub app_state_hash: Bytes32,
    pub challenge_registry_address: Address,
    pub state_timeout: U256,
    pub version_number: u64,
    pub signatures: Vec<SignatureBytes>,
}

/// Persisted form of a conditional transaction commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalTransactionCommitmentJson {
    pub app_identity_hash: Bytes32,
    pub free_balance_app_identity_hash: Bytes32,
    pub interpreter_addr: Address,
    pub interpreter_params: InterpreterParams,
    pub multisig_address: Address,
    /// Sorted owner addresses; fixes the signature slot order.
    pub multisig_owners: Vec<Address>,
    pub signatures: Vec<SignatureBytes>,
}

// =============================================================================
// CLUSTER F: DISPUTE RECORDS
// =============================================================================

/// An on-chain challenge observed (or about to be placed) for an app.
///
/// Stored with last-writer-by-version semantics: a save only wins if its
/// version number is higher than the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppChallenge {
    pub identity_hash: Bytes32,
    pub app_state_hash: Bytes32,
    pub version_number: u64,
    pub finalizes_at: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_app_json() -> AppInstanceJson {
        AppInstanceJson {
            identity_hash: Bytes32([0x01; 32]),
            multisig_address: Address([0x02; 20]),
            initiator_identifier: PublicIdentifier([0x03; 33]),
            responder_identifier: PublicIdentifier([0x04; 33]),
            default_timeout: U256::from(600u64),
            app_interface: AppInterface {
                addr: Address([0x05; 20]),
                state_encoding: "tuple(uint256 counter)".into(),
                action_encoding: None,
            },
            app_seq_no: 1,
            initiator_deposit: U256::from(10u64),
            initiator_deposit_token_address: Address::zero(),
            responder_deposit: U256::zero(),
            responder_deposit_token_address: Address::zero(),
            latest_state: serde_json::json!({ "counter": "0x00" }),
            latest_version_number: 0,
            state_timeout: U256::zero(),
            outcome_type: OutcomeType::SingleAssetTwoPartyCoinTransfer,
            interpreter_params: InterpreterParams::SingleAssetTwoPartyCoinTransfer {
                limit: U256::from(10u64),
                token_address: Address::zero(),
            },
            meta: None,
            latest_action: None,
        }
    }

    #[test]
    fn test_u256_serializes_as_hex_string() {
        let json = serde_json::to_value(U256::from(7u64)).unwrap();
        assert_eq!(json, serde_json::json!("0x7"));
    }

    #[test]
    fn test_interpreter_params_outcome_type_pairing() {
        let params = InterpreterParams::TwoPartyFixedOutcome {
            player_addrs: vec![Address([0x0A; 20]), Address([0x0B; 20])],
            amount: U256::from(1u64),
        };
        assert_eq!(params.outcome_type(), OutcomeType::TwoPartyFixedOutcome);
    }

    #[test]
    fn test_app_maps_serialize_as_pairs() {
        let app = sample_app_json();
        let channel = StateChannelJson {
            schema_version: 1,
            multisig_address: Address([0x09; 20]),
            addresses: ChannelAddresses {
                proxy_factory: Address([0x0C; 20]),
                multisig_mastercopy: Address([0x0D; 20]),
            },
            user_identifiers: vec![PublicIdentifier([0x03; 33]), PublicIdentifier([0x04; 33])],
            free_balance_app_instance: app.clone(),
            app_instances: [(app.identity_hash, app.clone())].into_iter().collect(),
            proposed_app_instances: BTreeMap::new(),
            monotonic_num_proposed_apps: 1,
        };

        let value = serde_json::to_value(&channel).unwrap();
        assert!(value["appInstances"].is_array());
        assert!(value["appInstances"][0].is_array());
        assert_eq!(value["appInstances"][0][0], serde_json::to_value(app.identity_hash).unwrap());
        assert!(value["proposedAppInstances"].as_array().unwrap().is_empty());

        let back: StateChannelJson = serde_json::from_value(value).unwrap();
        assert_eq!(back, channel);
    }

    #[test]
    fn test_multisig_operation_encoding() {
        assert_eq!(MultisigOperation::Call.as_u8(), 0);
        assert_eq!(MultisigOperation::DelegateCall.as_u8(), 1);
    }
}
