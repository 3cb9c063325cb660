//! # App Instance
//!
//! One installed (or proposed) piece of conditional off-chain logic: its
//! immutable identity, declared interface, and latest signed state.
//!
//! The identity hash is computed once at construction from the immutable
//! identity fields and is the app's primary key everywhere; it is never
//! recomputed from mutable state.

use serde_json::Value;

use shared_crypto::abi::{self, Token};
use shared_crypto::{keccak256, signer_address_of};
use shared_types::{
    Address, AppIdentity, AppInstanceJson, AppInterface, Bytes32, InterpreterParams, OutcomeType,
    PublicIdentifier, U256,
};

use super::errors::ChannelError;

/// Digest of an opaque app state document: keccak-256 over its canonical
/// (sorted-key) JSON encoding. Both parties must produce the identical
/// digest for signature exchange to succeed.
#[must_use]
pub fn hash_of_state(state: &Value) -> Bytes32 {
    let canonical = serde_json::to_vec(state).unwrap_or_default();
    keccak256(&canonical)
}

/// Deterministic hash of an app's immutable identity fields.
#[must_use]
pub fn app_identity_hash(identity: &AppIdentity) -> Bytes32 {
    keccak256(&abi::encode(&[
        Token::Uint(identity.channel_nonce),
        Token::AddressArray(identity.participants.clone()),
    ]))
}

/// Construction parameters for a new app instance.
#[derive(Debug, Clone)]
pub struct AppInstanceSeed {
    pub multisig_address: Address,
    pub initiator_identifier: PublicIdentifier,
    pub responder_identifier: PublicIdentifier,
    pub default_timeout: U256,
    pub app_interface: AppInterface,
    pub app_seq_no: u64,
    pub initiator_deposit: U256,
    pub initiator_deposit_token_address: Address,
    pub responder_deposit: U256,
    pub responder_deposit_token_address: Address,
    pub initial_state: Value,
    pub state_timeout: U256,
    pub outcome_type: OutcomeType,
    pub interpreter_params: InterpreterParams,
    pub meta: Option<Value>,
}

/// One conditional application inside a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInstance {
    identity_hash: Bytes32,
    multisig_address: Address,
    initiator_identifier: PublicIdentifier,
    responder_identifier: PublicIdentifier,
    /// Signer addresses in (initiator, responder) order.
    participants: [Address; 2],
    default_timeout: U256,
    app_interface: AppInterface,
    app_seq_no: u64,
    initiator_deposit: U256,
    initiator_deposit_token_address: Address,
    responder_deposit: U256,
    responder_deposit_token_address: Address,
    latest_state: Value,
    latest_version_number: u64,
    state_timeout: U256,
    outcome_type: OutcomeType,
    interpreter_params: InterpreterParams,
    meta: Option<Value>,
    latest_action: Option<Value>,
}

impl AppInstance {
    /// Validate and construct a new app instance at version 0.
    pub fn new(seed: AppInstanceSeed) -> Result<Self, ChannelError> {
        let initiator = signer_address_of(&seed.initiator_identifier)?;
        let responder = signer_address_of(&seed.responder_identifier)?;
        if initiator == responder {
            return Err(ChannelError::IdenticalParticipants { address: initiator });
        }
        validate_interpreter_params(seed.outcome_type, &seed.interpreter_params)?;

        let participants = [initiator, responder];
        let identity = AppIdentity {
            participants: participants.to_vec(),
            multisig_address: seed.multisig_address,
            app_definition: seed.app_interface.addr,
            default_timeout: seed.default_timeout,
            channel_nonce: U256::from(seed.app_seq_no),
        };

        Ok(Self {
            identity_hash: app_identity_hash(&identity),
            multisig_address: seed.multisig_address,
            initiator_identifier: seed.initiator_identifier,
            responder_identifier: seed.responder_identifier,
            participants,
            default_timeout: seed.default_timeout,
            app_interface: seed.app_interface,
            app_seq_no: seed.app_seq_no,
            initiator_deposit: seed.initiator_deposit,
            initiator_deposit_token_address: seed.initiator_deposit_token_address,
            responder_deposit: seed.responder_deposit,
            responder_deposit_token_address: seed.responder_deposit_token_address,
            latest_state: seed.initial_state,
            latest_version_number: 0,
            state_timeout: seed.state_timeout,
            outcome_type: seed.outcome_type,
            interpreter_params: seed.interpreter_params,
            meta: seed.meta,
            latest_action: None,
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn identity_hash(&self) -> Bytes32 {
        self.identity_hash
    }

    #[must_use]
    pub fn multisig_address(&self) -> Address {
        self.multisig_address
    }

    #[must_use]
    pub fn initiator_identifier(&self) -> PublicIdentifier {
        self.initiator_identifier
    }

    #[must_use]
    pub fn responder_identifier(&self) -> PublicIdentifier {
        self.responder_identifier
    }

    /// Signer addresses in (initiator, responder) order.
    #[must_use]
    pub fn participants(&self) -> [Address; 2] {
        self.participants
    }

    #[must_use]
    pub fn default_timeout(&self) -> U256 {
        self.default_timeout
    }

    #[must_use]
    pub fn app_interface(&self) -> &AppInterface {
        &self.app_interface
    }

    #[must_use]
    pub fn app_seq_no(&self) -> u64 {
        self.app_seq_no
    }

    #[must_use]
    pub fn initiator_deposit(&self) -> U256 {
        self.initiator_deposit
    }

    #[must_use]
    pub fn initiator_deposit_token_address(&self) -> Address {
        self.initiator_deposit_token_address
    }

    #[must_use]
    pub fn responder_deposit(&self) -> U256 {
        self.responder_deposit
    }

    #[must_use]
    pub fn responder_deposit_token_address(&self) -> Address {
        self.responder_deposit_token_address
    }

    #[must_use]
    pub fn latest_state(&self) -> &Value {
        &self.latest_state
    }

    #[must_use]
    pub fn latest_version_number(&self) -> u64 {
        self.latest_version_number
    }

    #[must_use]
    pub fn state_timeout(&self) -> U256 {
        self.state_timeout
    }

    #[must_use]
    pub fn outcome_type(&self) -> OutcomeType {
        self.outcome_type
    }

    #[must_use]
    pub fn interpreter_params(&self) -> &InterpreterParams {
        &self.interpreter_params
    }

    #[must_use]
    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    #[must_use]
    pub fn latest_action(&self) -> Option<&Value> {
        self.latest_action.as_ref()
    }

    /// The immutable identity this instance was constructed from.
    #[must_use]
    pub fn identity(&self) -> AppIdentity {
        AppIdentity {
            participants: self.participants.to_vec(),
            multisig_address: self.multisig_address,
            app_definition: self.app_interface.addr,
            default_timeout: self.default_timeout,
            channel_nonce: U256::from(self.app_seq_no),
        }
    }

    /// Digest of the latest state document.
    #[must_use]
    pub fn state_hash(&self) -> Bytes32 {
        hash_of_state(&self.latest_state)
    }

    /// The free-balance debits installing this app requires:
    /// `{token: {participant: deposit}}`, zero deposits omitted.
    #[must_use]
    pub fn funding_decrements(&self) -> shared_types::TokenIndexedBalances {
        let mut decrements = shared_types::TokenIndexedBalances::new();
        if !self.initiator_deposit.is_zero() {
            decrements
                .entry(self.initiator_deposit_token_address)
                .or_default()
                .insert(self.participants[0], self.initiator_deposit);
        }
        if !self.responder_deposit.is_zero() {
            decrements
                .entry(self.responder_deposit_token_address)
                .or_default()
                .insert(self.participants[1], self.responder_deposit);
        }
        decrements
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Advance to a new signed state.
    ///
    /// Fails with `StaleVersion` unless the version number strictly
    /// increases.
    pub fn set_state(
        &self,
        new_state: Value,
        new_version_number: u64,
        new_state_timeout: U256,
    ) -> Result<Self, ChannelError> {
        if new_version_number <= self.latest_version_number {
            return Err(ChannelError::StaleVersion {
                identity_hash: self.identity_hash,
                latest: self.latest_version_number,
                attempted: new_version_number,
            });
        }
        let mut next = self.clone();
        next.latest_state = new_state;
        next.latest_version_number = new_version_number;
        next.state_timeout = new_state_timeout;
        Ok(next)
    }

    /// Advance state via an applied action, recording the action taken.
    ///
    /// Action applicability is validated by the app's own transition
    /// logic before this is called; only version monotonicity is enforced
    /// here.
    pub fn lock_state(
        &self,
        action: Value,
        new_state: Value,
        new_version_number: u64,
    ) -> Result<Self, ChannelError> {
        let mut next = self.set_state(new_state, new_version_number, self.default_timeout)?;
        next.latest_action = Some(action);
        Ok(next)
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    #[must_use]
    pub fn to_json(&self) -> AppInstanceJson {
        AppInstanceJson {
            identity_hash: self.identity_hash,
            multisig_address: self.multisig_address,
            initiator_identifier: self.initiator_identifier,
            responder_identifier: self.responder_identifier,
            default_timeout: self.default_timeout,
            app_interface: self.app_interface.clone(),
            app_seq_no: self.app_seq_no,
            initiator_deposit: self.initiator_deposit,
            initiator_deposit_token_address: self.initiator_deposit_token_address,
            responder_deposit: self.responder_deposit,
            responder_deposit_token_address: self.responder_deposit_token_address,
            latest_state: self.latest_state.clone(),
            latest_version_number: self.latest_version_number,
            state_timeout: self.state_timeout,
            outcome_type: self.outcome_type,
            interpreter_params: self.interpreter_params.clone(),
            meta: self.meta.clone(),
            latest_action: self.latest_action.clone(),
        }
    }

    /// Rehydrate from the persisted document.
    ///
    /// The identity hash is recomputed from the identity fields and must
    /// match the stored one; a mismatch means the document was corrupted
    /// or tampered with.
    pub fn from_json(json: AppInstanceJson) -> Result<Self, ChannelError> {
        let mut instance = Self::new(AppInstanceSeed {
            multisig_address: json.multisig_address,
            initiator_identifier: json.initiator_identifier,
            responder_identifier: json.responder_identifier,
            default_timeout: json.default_timeout,
            app_interface: json.app_interface,
            app_seq_no: json.app_seq_no,
            initiator_deposit: json.initiator_deposit,
            initiator_deposit_token_address: json.initiator_deposit_token_address,
            responder_deposit: json.responder_deposit,
            responder_deposit_token_address: json.responder_deposit_token_address,
            initial_state: json.latest_state,
            state_timeout: json.state_timeout,
            outcome_type: json.outcome_type,
            interpreter_params: json.interpreter_params,
            meta: json.meta,
        })?;
        instance.latest_version_number = json.latest_version_number;
        instance.latest_action = json.latest_action;

        if instance.identity_hash != json.identity_hash {
            return Err(ChannelError::MalformedAppState(format!(
                "identity hash mismatch: stored {}, derived {}",
                json.identity_hash, instance.identity_hash
            )));
        }
        Ok(instance)
    }
}

fn validate_interpreter_params(
    outcome_type: OutcomeType,
    params: &InterpreterParams,
) -> Result<(), ChannelError> {
    if params.outcome_type() != outcome_type {
        return Err(ChannelError::InterpreterParamsMismatch {
            outcome_type,
            actual: params.outcome_type(),
        });
    }
    match params {
        InterpreterParams::TwoPartyFixedOutcome { player_addrs, .. } => {
            if player_addrs.len() != 2 {
                return Err(ChannelError::InvalidPlayerCount {
                    actual: player_addrs.len(),
                });
            }
        }
        InterpreterParams::MultiAssetMultiPartyCoinTransfer {
            limit,
            token_addresses,
        } => {
            if limit.len() != token_addresses.len() {
                return Err(ChannelError::MalformedAppState(format!(
                    "{} limits for {} token addresses",
                    limit.len(),
                    token_addresses.len()
                )));
            }
        }
        InterpreterParams::SingleAssetTwoPartyCoinTransfer { .. } => {}
    }
    Ok(())
}
