//! # Persistence Port
//!
//! The store owns the persisted `StateChannel` documents and their
//! commitments. Every mutating call is transactionally atomic: the new
//! aggregate and its freshly produced commitments are written together or
//! not at all. Protocol machines only ever hold a transient checked-out
//! copy while the channel lock is held.

use async_trait::async_trait;
use thiserror::Error;

use shared_types::{
    Address, AppChallenge, AppInstanceJson, Bytes32, ConditionalTransactionCommitmentJson,
    MultisigTransaction, SetStateCommitmentJson, StateChannelJson,
};

/// Errors from the persistence collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No channel persisted for multisig {multisig_address}")]
    ChannelNotFound { multisig_address: Address },

    #[error("Channel already persisted for multisig {multisig_address}")]
    ChannelAlreadyExists { multisig_address: Address },

    #[error("No commitment stored for app {identity_hash}")]
    CommitmentNotFound { identity_hash: Bytes32 },

    /// Transient I/O failure; callers retry a bounded number of times.
    #[error("Transient store I/O failure: {0}")]
    TransientIo(String),

    #[error("Store serialization failure: {0}")]
    Serialization(String),
}

/// Transactional persistence for channels, commitments, and challenges.
#[async_trait]
pub trait StateChannelStore: Send + Sync {
    /// Fetch a channel document, if any.
    async fn get_state_channel(
        &self,
        multisig_address: Address,
    ) -> Result<Option<StateChannelJson>, StoreError>;

    /// Persist a freshly set-up channel with its setup transaction and
    /// the free balance's version-0 attestation.
    async fn create_state_channel(
        &self,
        channel: &StateChannelJson,
        setup_tx: &MultisigTransaction,
        free_balance_set_state: &SetStateCommitmentJson,
    ) -> Result<(), StoreError>;

    /// Persist a new proposal together with the advanced channel document
    /// and the jointly-signed attestation of its initial state.
    async fn create_app_proposal(
        &self,
        channel: &StateChannelJson,
        proposal: &AppInstanceJson,
        initial_set_state: &SetStateCommitmentJson,
    ) -> Result<(), StoreError>;

    /// Drop a proposal together with the advanced channel document.
    async fn remove_app_proposal(
        &self,
        channel: &StateChannelJson,
        identity_hash: Bytes32,
    ) -> Result<(), StoreError>;

    /// Promote a proposal: the installed app, the advanced free balance
    /// attestation, and the app's conditional commitment land atomically
    /// with the channel document.
    async fn create_app_instance(
        &self,
        channel: &StateChannelJson,
        app: &AppInstanceJson,
        free_balance_set_state: &SetStateCommitmentJson,
        conditional_commitment: &ConditionalTransactionCommitmentJson,
    ) -> Result<(), StoreError>;

    /// Advance one app's state and its set-state attestation.
    async fn update_app_instance(
        &self,
        channel: &StateChannelJson,
        app: &AppInstanceJson,
        set_state: &SetStateCommitmentJson,
    ) -> Result<(), StoreError>;

    /// Remove an app and advance the free balance attestation.
    async fn remove_app_instance(
        &self,
        channel: &StateChannelJson,
        identity_hash: Bytes32,
        free_balance_set_state: &SetStateCommitmentJson,
    ) -> Result<(), StoreError>;

    /// Replace the whole channel record from a verified sync snapshot.
    async fn save_synced_channel(
        &self,
        channel: &StateChannelJson,
        free_balance_set_state: &SetStateCommitmentJson,
        set_state_commitments: &[SetStateCommitmentJson],
        conditional_commitments: &[ConditionalTransactionCommitmentJson],
    ) -> Result<(), StoreError>;

    /// Latest free balance attestation for a channel.
    async fn get_free_balance_set_state(
        &self,
        multisig_address: Address,
    ) -> Result<SetStateCommitmentJson, StoreError>;

    /// Latest per-app set-state attestations for a channel.
    async fn get_set_state_commitments(
        &self,
        multisig_address: Address,
    ) -> Result<Vec<SetStateCommitmentJson>, StoreError>;

    /// Conditional commitments for a channel's active apps.
    async fn get_conditional_commitments(
        &self,
        multisig_address: Address,
    ) -> Result<Vec<ConditionalTransactionCommitmentJson>, StoreError>;

    /// The setup transaction persisted at channel creation.
    async fn get_setup_transaction(
        &self,
        multisig_address: Address,
    ) -> Result<Option<MultisigTransaction>, StoreError>;

    /// Record a challenge with last-writer-by-version semantics: a save
    /// only replaces the stored record if its version number is strictly
    /// higher. Returns whether the write won.
    async fn save_app_challenge(&self, challenge: &AppChallenge) -> Result<bool, StoreError>;

    /// Fetch the highest-version challenge recorded for an app.
    async fn get_app_challenge(
        &self,
        identity_hash: Bytes32,
    ) -> Result<Option<AppChallenge>, StoreError>;
}
