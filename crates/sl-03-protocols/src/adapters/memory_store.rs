//! # In-Memory Store Adapter
//!
//! Reference implementation of the persistence port. One record per
//! multisig address, replaced wholesale under a write lock, so every
//! mutating call is atomic: the new aggregate and its commitments land
//! together or not at all. Concurrent reads of committed state take the
//! read lock only.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use shared_types::{
    Address, AppChallenge, AppInstanceJson, Bytes32, ConditionalTransactionCommitmentJson,
    MultisigTransaction, SetStateCommitmentJson, StateChannelJson,
};

use crate::ports::{StateChannelStore, StoreError};

#[derive(Debug, Clone)]
struct ChannelRecord {
    channel: StateChannelJson,
    setup_tx: Option<MultisigTransaction>,
    free_balance_set_state: SetStateCommitmentJson,
    set_state_commitments: HashMap<Bytes32, SetStateCommitmentJson>,
    conditional_commitments: HashMap<Bytes32, ConditionalTransactionCommitmentJson>,
}

/// In-memory channel store.
#[derive(Default)]
pub struct InMemoryStateChannelStore {
    channels: RwLock<HashMap<Address, ChannelRecord>>,
    challenges: RwLock<HashMap<Bytes32, AppChallenge>>,
}

impl InMemoryStateChannelStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<T>(
        &self,
        multisig_address: Address,
        f: impl FnOnce(&mut ChannelRecord) -> T,
    ) -> Result<T, StoreError> {
        let mut channels = self.channels.write();
        let record = channels
            .get_mut(&multisig_address)
            .ok_or(StoreError::ChannelNotFound { multisig_address })?;
        Ok(f(record))
    }
}

#[async_trait]
impl StateChannelStore for InMemoryStateChannelStore {
    async fn get_state_channel(
        &self,
        multisig_address: Address,
    ) -> Result<Option<StateChannelJson>, StoreError> {
        Ok(self
            .channels
            .read()
            .get(&multisig_address)
            .map(|record| record.channel.clone()))
    }

    async fn create_state_channel(
        &self,
        channel: &StateChannelJson,
        setup_tx: &MultisigTransaction,
        free_balance_set_state: &SetStateCommitmentJson,
    ) -> Result<(), StoreError> {
        let mut channels = self.channels.write();
        if channels.contains_key(&channel.multisig_address) {
            return Err(StoreError::ChannelAlreadyExists {
                multisig_address: channel.multisig_address,
            });
        }
        channels.insert(
            channel.multisig_address,
            ChannelRecord {
                channel: channel.clone(),
                setup_tx: Some(setup_tx.clone()),
                free_balance_set_state: free_balance_set_state.clone(),
                set_state_commitments: HashMap::new(),
                conditional_commitments: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn create_app_proposal(
        &self,
        channel: &StateChannelJson,
        proposal: &AppInstanceJson,
        initial_set_state: &SetStateCommitmentJson,
    ) -> Result<(), StoreError> {
        self.with_record(channel.multisig_address, |record| {
            record.channel = channel.clone();
            record
                .set_state_commitments
                .insert(proposal.identity_hash, initial_set_state.clone());
        })
    }

    async fn remove_app_proposal(
        &self,
        channel: &StateChannelJson,
        identity_hash: Bytes32,
    ) -> Result<(), StoreError> {
        self.with_record(channel.multisig_address, |record| {
            record.channel = channel.clone();
            record.set_state_commitments.remove(&identity_hash);
        })
    }

    async fn create_app_instance(
        &self,
        channel: &StateChannelJson,
        app: &AppInstanceJson,
        free_balance_set_state: &SetStateCommitmentJson,
        conditional_commitment: &ConditionalTransactionCommitmentJson,
    ) -> Result<(), StoreError> {
        self.with_record(channel.multisig_address, |record| {
            record.channel = channel.clone();
            record.free_balance_set_state = free_balance_set_state.clone();
            record
                .conditional_commitments
                .insert(app.identity_hash, conditional_commitment.clone());
        })
    }

    async fn update_app_instance(
        &self,
        channel: &StateChannelJson,
        app: &AppInstanceJson,
        set_state: &SetStateCommitmentJson,
    ) -> Result<(), StoreError> {
        self.with_record(channel.multisig_address, |record| {
            record.channel = channel.clone();
            record
                .set_state_commitments
                .insert(app.identity_hash, set_state.clone());
        })
    }

    async fn remove_app_instance(
        &self,
        channel: &StateChannelJson,
        identity_hash: Bytes32,
        free_balance_set_state: &SetStateCommitmentJson,
    ) -> Result<(), StoreError> {
        self.with_record(channel.multisig_address, |record| {
            record.channel = channel.clone();
            record.free_balance_set_state = free_balance_set_state.clone();
            record.set_state_commitments.remove(&identity_hash);
            record.conditional_commitments.remove(&identity_hash);
        })
    }

    async fn save_synced_channel(
        &self,
        channel: &StateChannelJson,
        free_balance_set_state: &SetStateCommitmentJson,
        set_state_commitments: &[SetStateCommitmentJson],
        conditional_commitments: &[ConditionalTransactionCommitmentJson],
    ) -> Result<(), StoreError> {
        let mut channels = self.channels.write();
        let setup_tx = channels
            .get(&channel.multisig_address)
            .and_then(|record| record.setup_tx.clone());
        channels.insert(
            channel.multisig_address,
            ChannelRecord {
                channel: channel.clone(),
                setup_tx,
                free_balance_set_state: free_balance_set_state.clone(),
                set_state_commitments: set_state_commitments
                    .iter()
                    .map(|c| (c.app_identity_hash, c.clone()))
                    .collect(),
                conditional_commitments: conditional_commitments
                    .iter()
                    .map(|c| (c.app_identity_hash, c.clone()))
                    .collect(),
            },
        );
        Ok(())
    }

    async fn get_free_balance_set_state(
        &self,
        multisig_address: Address,
    ) -> Result<SetStateCommitmentJson, StoreError> {
        self.channels
            .read()
            .get(&multisig_address)
            .map(|record| record.free_balance_set_state.clone())
            .ok_or(StoreError::ChannelNotFound { multisig_address })
    }

    async fn get_set_state_commitments(
        &self,
        multisig_address: Address,
    ) -> Result<Vec<SetStateCommitmentJson>, StoreError> {
        self.channels
            .read()
            .get(&multisig_address)
            .map(|record| record.set_state_commitments.values().cloned().collect())
            .ok_or(StoreError::ChannelNotFound { multisig_address })
    }

    async fn get_conditional_commitments(
        &self,
        multisig_address: Address,
    ) -> Result<Vec<ConditionalTransactionCommitmentJson>, StoreError> {
        self.channels
            .read()
            .get(&multisig_address)
            .map(|record| record.conditional_commitments.values().cloned().collect())
            .ok_or(StoreError::ChannelNotFound { multisig_address })
    }

    async fn get_setup_transaction(
        &self,
        multisig_address: Address,
    ) -> Result<Option<MultisigTransaction>, StoreError> {
        Ok(self
            .channels
            .read()
            .get(&multisig_address)
            .and_then(|record| record.setup_tx.clone()))
    }

    async fn save_app_challenge(&self, challenge: &AppChallenge) -> Result<bool, StoreError> {
        let mut challenges = self.challenges.write();
        match challenges.get(&challenge.identity_hash) {
            Some(existing) if existing.version_number >= challenge.version_number => Ok(false),
            _ => {
                challenges.insert(challenge.identity_hash, challenge.clone());
                Ok(true)
            }
        }
    }

    async fn get_app_challenge(
        &self,
        identity_hash: Bytes32,
    ) -> Result<Option<AppChallenge>, StoreError> {
        Ok(self.challenges.read().get(&identity_hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::U256;
    use std::sync::Arc;

    fn challenge(version_number: u64) -> AppChallenge {
        AppChallenge {
            identity_hash: Bytes32([0x11; 32]),
            app_state_hash: Bytes32([version_number as u8; 32]),
            version_number,
            finalizes_at: U256::from(1000u64),
        }
    }

    #[tokio::test]
    async fn test_challenge_save_is_last_writer_by_version() {
        let store = InMemoryStateChannelStore::new();
        assert!(store.save_app_challenge(&challenge(3)).await.unwrap());
        // Lower version loses even though it arrives later.
        assert!(!store.save_app_challenge(&challenge(2)).await.unwrap());
        // Equal version loses too.
        assert!(!store.save_app_challenge(&challenge(3)).await.unwrap());
        assert!(store.save_app_challenge(&challenge(4)).await.unwrap());

        let stored = store
            .get_app_challenge(Bytes32([0x11; 32]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version_number, 4);
    }

    #[tokio::test]
    async fn test_concurrent_challenge_saves_converge_to_highest() {
        let store = Arc::new(InMemoryStateChannelStore::new());
        let mut tasks = Vec::new();
        for version_number in 1..=20u64 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.save_app_challenge(&challenge(version_number)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        let stored = store
            .get_app_challenge(Bytes32([0x11; 32]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version_number, 20);
    }

    #[tokio::test]
    async fn test_missing_channel_is_reported() {
        let store = InMemoryStateChannelStore::new();
        let missing = Address([0x99; 20]);
        assert_eq!(store.get_state_channel(missing).await.unwrap(), None);
        assert!(matches!(
            store.get_free_balance_set_state(missing).await.unwrap_err(),
            StoreError::ChannelNotFound { .. }
        ));
    }
}
