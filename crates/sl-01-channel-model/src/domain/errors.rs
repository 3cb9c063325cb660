use shared_types::{Address, Bytes32, OutcomeType, U256};
use thiserror::Error;

/// Errors from channel model operations.
///
/// Every variant carries enough context (multisig address, identity hash)
/// to correlate log lines without inspecting message bodies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error(
        "Insufficient free balance in channel {multisig_address}: \
         token {token_address}, owner {owner}, required {required}, available {available}"
    )]
    InsufficientBalance {
        multisig_address: Address,
        token_address: Address,
        owner: Address,
        required: U256,
        available: U256,
    },

    #[error("Stale version for app {identity_hash}: latest {latest}, attempted {attempted}")]
    StaleVersion {
        identity_hash: Bytes32,
        latest: u64,
        attempted: u64,
    },

    #[error("No proposal with identity hash {identity_hash}")]
    ProposalNotFound { identity_hash: Bytes32 },

    #[error("No active app with identity hash {identity_hash}")]
    AppNotFound { identity_hash: Bytes32 },

    #[error("Cannot uninstall the free balance of channel {multisig_address}")]
    CannotUninstallFreeBalance { multisig_address: Address },

    #[error("App already present with identity hash {identity_hash}")]
    AppAlreadyExists { identity_hash: Bytes32 },

    #[error("Channel requires exactly two owners, got {actual}")]
    InvalidOwnerCount { actual: usize },

    #[error("Participant identifiers resolve to the same signer address {address}")]
    IdenticalParticipants { address: Address },

    #[error("App sequence number {actual} does not continue channel sequence {expected}")]
    NonSequentialAppSeqNo { expected: u64, actual: u64 },

    #[error("Interpreter params for outcome {outcome_type} have shape {actual}")]
    InterpreterParamsMismatch {
        outcome_type: OutcomeType,
        actual: OutcomeType,
    },

    #[error("TwoPartyFixedOutcome requires exactly 2 player addresses, got {actual}")]
    InvalidPlayerCount { actual: usize },

    #[error("Malformed app state document: {0}")]
    MalformedAppState(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] shared_crypto::CryptoError),
}
