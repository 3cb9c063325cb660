//! # Setup Commitment
//!
//! Signed at channel setup, before any deposits. Registers the free
//! balance's outcome-resolution path through the multi-asset interpreter
//! so that collateral is recoverable on-chain from the very first block
//! of the channel's life.

use shared_crypto::abi::{self, Token};
use shared_types::{
    Address, Bytes32, MultisigOperation, MultisigTransaction, NetworkContext, SignatureBytes, U256,
};

use super::errors::CommitmentError;
use super::multisig_commitment::MultisigTxCommitment;

/// The setup transaction delegating free balance outcome resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupCommitment {
    commitment: MultisigTxCommitment,
    free_balance_identity_hash: Bytes32,
}

impl SetupCommitment {
    /// Build the setup commitment for a freshly set-up channel.
    ///
    /// Deterministic: the same network context, multisig, owners, and
    /// free balance hash always produce byte-identical calldata.
    pub fn new(
        network: &NetworkContext,
        multisig_address: Address,
        owners: &[Address],
        free_balance_identity_hash: Bytes32,
    ) -> Result<Self, CommitmentError> {
        let data = abi::encode_call(
            "setupOutcome(address,bytes32,address)",
            &[
                Token::Address(network.challenge_registry),
                Token::FixedBytes(free_balance_identity_hash),
                Token::Address(network.multi_asset_multi_party_coin_transfer_interpreter),
            ],
        );
        let inner = MultisigTransaction {
            to: network.conditional_transaction_delegate,
            value: U256::zero(),
            data: data.into(),
            operation: MultisigOperation::DelegateCall,
        };
        Ok(Self {
            commitment: MultisigTxCommitment::new(multisig_address, owners, inner)?,
            free_balance_identity_hash,
        })
    }

    #[must_use]
    pub fn free_balance_identity_hash(&self) -> Bytes32 {
        self.free_balance_identity_hash
    }

    #[must_use]
    pub fn hash_to_sign(&self) -> Bytes32 {
        self.commitment.hash_to_sign()
    }

    pub fn add_signature(&mut self, signature: SignatureBytes) -> Result<Address, CommitmentError> {
        self.commitment.add_signature(signature)
    }

    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        self.commitment.signatures().is_fully_signed()
    }

    #[must_use]
    pub fn signatures(&self) -> Vec<SignatureBytes> {
        self.commitment.signatures().to_vec()
    }

    /// The broadcastable transaction; fails unless fully signed.
    pub fn signed_transaction(&self) -> Result<MultisigTransaction, CommitmentError> {
        self.commitment.signed_transaction()
    }
}
