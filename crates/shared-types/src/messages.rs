//! # Protocol Message Types
//!
//! Wire-level types exchanged between channel peers while a protocol is in
//! flight. Every message carries the protocol name, a v4 UUID process id
//! (replay protection and correlation), a 1-based round number, and typed
//! parameters; commitment signatures produced in a round ride alongside.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{
    AbiEncodings, ChannelAddresses, ConditionalTransactionCommitmentJson, OutcomeType,
    SetStateCommitmentJson, StateChannelJson, U256,
};
use crate::primitives::{Address, Bytes32, PublicIdentifier, SignatureBytes};

/// The protocols a channel peer can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolName {
    Setup,
    Propose,
    Install,
    TakeAction,
    Uninstall,
    Sync,
}

impl std::fmt::Display for ProtocolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Propose => "propose",
            Self::Install => "install",
            Self::TakeAction => "take-action",
            Self::Uninstall => "uninstall",
            Self::Sync => "sync",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// PER-PROTOCOL PARAMETERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupParams {
    pub multisig_address: Address,
    pub initiator_identifier: PublicIdentifier,
    pub responder_identifier: PublicIdentifier,
    pub addresses: ChannelAddresses,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeParams {
    pub multisig_address: Address,
    pub initiator_identifier: PublicIdentifier,
    pub responder_identifier: PublicIdentifier,
    /// App definition contract this proposal instantiates.
    pub app_definition: Address,
    pub abi_encodings: AbiEncodings,
    pub initiator_deposit: U256,
    pub initiator_deposit_token_address: Address,
    pub responder_deposit: U256,
    pub responder_deposit_token_address: Address,
    pub default_timeout: U256,
    pub state_timeout: U256,
    /// Opaque initial app state.
    pub initial_state: serde_json::Value,
    pub outcome_type: OutcomeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallParams {
    pub multisig_address: Address,
    pub identity_hash: Bytes32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeActionParams {
    pub multisig_address: Address,
    pub identity_hash: Bytes32,
    /// Opaque app action, interpreted by the app's transition logic.
    pub action: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallParams {
    pub multisig_address: Address,
    pub identity_hash: Bytes32,
}

/// One side's full channel snapshot, exchanged during sync.
///
/// Carries the commitments backing the snapshot so the adopting side can
/// re-verify every signature before persisting anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub channel: StateChannelJson,
    pub free_balance_set_state: SetStateCommitmentJson,
    pub set_state_commitments: Vec<SetStateCommitmentJson>,
    pub conditional_commitments: Vec<ConditionalTransactionCommitmentJson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncParams {
    pub multisig_address: Address,
    /// The sender's snapshot; `None` only in the engine-facing request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Box<SyncSnapshot>>,
}

/// Typed protocol parameters; one variant per protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "kebab-case")]
pub enum ProtocolParams {
    Setup(SetupParams),
    Propose(ProposeParams),
    Install(InstallParams),
    TakeAction(TakeActionParams),
    Uninstall(UninstallParams),
    Sync(SyncParams),
}

impl ProtocolParams {
    /// The protocol these parameters belong to.
    #[must_use]
    pub fn protocol(&self) -> ProtocolName {
        match self {
            Self::Setup(_) => ProtocolName::Setup,
            Self::Propose(_) => ProtocolName::Propose,
            Self::Install(_) => ProtocolName::Install,
            Self::TakeAction(_) => ProtocolName::TakeAction,
            Self::Uninstall(_) => ProtocolName::Uninstall,
            Self::Sync(_) => ProtocolName::Sync,
        }
    }

    /// The multisig address the protocol targets.
    #[must_use]
    pub fn multisig_address(&self) -> Address {
        match self {
            Self::Setup(p) => p.multisig_address,
            Self::Propose(p) => p.multisig_address,
            Self::Install(p) => p.multisig_address,
            Self::TakeAction(p) => p.multisig_address,
            Self::Uninstall(p) => p.multisig_address,
            Self::Sync(p) => p.multisig_address,
        }
    }
}

// =============================================================================
// MESSAGE ENVELOPE
// =============================================================================

/// One round-trip message of an in-flight protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMessage {
    /// Correlates every message of one protocol execution.
    pub process_id: Uuid,
    /// 1-based round number within the execution.
    pub seq: u8,
    pub from: PublicIdentifier,
    pub to: PublicIdentifier,
    pub params: ProtocolParams,
    /// Commitment signatures produced in this round, in the sender's
    /// signing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<SignatureBytes>,
    /// Identity hash echoed back for determinism checks (propose ack).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_hash: Option<Bytes32>,
}

impl ProtocolMessage {
    /// The protocol this message belongs to.
    #[must_use]
    pub fn protocol(&self) -> ProtocolName {
        self.params.protocol()
    }

    /// The channel this message targets.
    #[must_use]
    pub fn multisig_address(&self) -> Address {
        self.params.multisig_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_name_display() {
        assert_eq!(ProtocolName::TakeAction.to_string(), "take-action");
        assert_eq!(ProtocolName::Setup.to_string(), "setup");
    }

    #[test]
    fn test_params_report_protocol_and_multisig() {
        let params = ProtocolParams::Install(InstallParams {
            multisig_address: Address([0x07; 20]),
            identity_hash: Bytes32([0x01; 32]),
        });
        assert_eq!(params.protocol(), ProtocolName::Install);
        assert_eq!(params.multisig_address(), Address([0x07; 20]));
    }

    #[test]
    fn test_message_round_trip() {
        let msg = ProtocolMessage {
            process_id: Uuid::new_v4(),
            seq: 1,
            from: PublicIdentifier([0x03; 33]),
            to: PublicIdentifier([0x04; 33]),
            params: ProtocolParams::Uninstall(UninstallParams {
                multisig_address: Address([0x07; 20]),
                identity_hash: Bytes32([0x01; 32]),
            }),
            signatures: vec![SignatureBytes([0x05; 65])],
            identity_hash: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ProtocolMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
