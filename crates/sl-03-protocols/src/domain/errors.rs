use shared_types::{Address, Bytes32, ProtocolName, U256};
use thiserror::Error;

use crate::ports::{
    AppLogicError, ChainError, LockError, MessagingError, SignerError, StoreError,
};
use sl_01_channel_model::ChannelError;
use sl_02_commitments::CommitmentError;

/// Errors from protocol execution.
///
/// Validation variants reject before any lock is acquired or message is
/// sent; protocol variants abort the in-flight execution and leave
/// persisted state untouched; resource variants are retried or fatal to
/// the attempt per the caller's policy.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // =========================================================================
    // VALIDATION (rejected before locking or messaging)
    // =========================================================================
    #[error("No channel for multisig {multisig_address}")]
    ChannelNotFound { multisig_address: Address },

    #[error("Channel already set up for multisig {multisig_address}")]
    ChannelAlreadyExists { multisig_address: Address },

    #[error("App definition {app_definition} does not match the registry: {detail}")]
    AppRegistryMismatch {
        app_definition: Address,
        detail: String,
    },

    #[error("Unsupported deposit token {token_address}")]
    UnsupportedToken { token_address: Address },

    #[error("Cannot install an app with zero-valued deposits for both parties")]
    ZeroDeposits,

    #[error("Deposit of {deposit} does not match initial transfer amount {transfer}")]
    DepositMismatch { deposit: U256, transfer: U256 },

    #[error(
        "Single-asset app proposed with two deposit tokens: \
         initiator {initiator_token}, responder {responder_token}"
    )]
    SingleAssetTokenMismatch {
        initiator_token: Address,
        responder_token: Address,
    },

    #[error("Responder deposit must be zero for a unidirectional transfer, got {deposit}")]
    NonZeroResponderDeposit { deposit: U256 },

    #[error("Initiator deposit must be positive for a unidirectional transfer, got {deposit}")]
    NonPositiveInitiatorDeposit { deposit: U256 },

    #[error(
        "Multisig {multisig_address} holds {available} of token {token_address}, \
         install requires {required}"
    )]
    InsufficientMultisigBalance {
        multisig_address: Address,
        token_address: Address,
        required: U256,
        available: U256,
    },

    // =========================================================================
    // PROTOCOL (abort in-flight execution, no partial writes)
    // =========================================================================
    #[error(
        "Channel {multisig_address} desynchronized: {detail}; \
         manual intervention required"
    )]
    ChannelDesynchronized {
        multisig_address: Address,
        detail: String,
    },

    #[error("Unexpected {protocol} message: awaited seq {expected_seq}, got {actual_seq}")]
    UnexpectedMessage {
        protocol: ProtocolName,
        expected_seq: u8,
        actual_seq: u8,
    },

    #[error("Counterparty omitted a required signature for {protocol} round {seq}")]
    MissingCounterpartySignature { protocol: ProtocolName, seq: u8 },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    #[error(transparent)]
    AppLogic(#[from] AppLogicError),

    // =========================================================================
    // RESOURCE
    // =========================================================================
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl ProtocolError {
    /// Whether retrying the whole protocol attempt may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::TransientIo(_))
                | Self::Messaging(MessagingError::Timeout { .. })
                | Self::Lock(LockError::AcquireTimeout { .. })
        )
    }
}

/// A protocol failure with its execution context attached, surfaced to
/// callers so log correlation never needs message bodies.
#[derive(Debug, Error)]
#[error("{protocol} protocol failed for channel {multisig_address}: {source}")]
pub struct ProtocolRunError {
    pub protocol: ProtocolName,
    pub multisig_address: Address,
    /// Identity hash of the app involved, where applicable.
    pub identity_hash: Option<Bytes32>,
    #[source]
    pub source: ProtocolError,
}

impl ProtocolRunError {
    #[must_use]
    pub fn new(
        protocol: ProtocolName,
        multisig_address: Address,
        identity_hash: Option<Bytes32>,
        source: ProtocolError,
    ) -> Self {
        Self {
            protocol,
            multisig_address,
            identity_hash,
            source,
        }
    }
}
