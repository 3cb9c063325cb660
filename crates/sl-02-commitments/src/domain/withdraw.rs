//! # Withdraw Commitment
//!
//! A value transfer out of the multisig to a recipient. Constructed only
//! after the caller has checked free balance headroom; the builder itself
//! stays pure.

use shared_crypto::abi::{self, Token};
use shared_types::{
    Address, Bytes32, HexBytes, MultisigOperation, MultisigTransaction, SignatureBytes,
    NATIVE_TOKEN_ADDRESS, U256,
};

use super::errors::CommitmentError;
use super::multisig_commitment::MultisigTxCommitment;

/// A jointly-signed withdrawal from the multisig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawCommitment {
    commitment: MultisigTxCommitment,
    recipient: Address,
    asset_id: Address,
    amount: U256,
}

impl WithdrawCommitment {
    /// Native-asset withdrawals transfer value directly; token
    /// withdrawals call `transfer(address,uint256)` on the token
    /// contract with zero value.
    pub fn new(
        multisig_address: Address,
        owners: &[Address],
        recipient: Address,
        asset_id: Address,
        amount: U256,
    ) -> Result<Self, CommitmentError> {
        let inner = if asset_id == NATIVE_TOKEN_ADDRESS {
            MultisigTransaction {
                to: recipient,
                value: amount,
                data: HexBytes::default(),
                operation: MultisigOperation::Call,
            }
        } else {
            MultisigTransaction {
                to: asset_id,
                value: U256::zero(),
                data: abi::encode_call(
                    "transfer(address,uint256)",
                    &[Token::Address(recipient), Token::Uint(amount)],
                )
                .into(),
                operation: MultisigOperation::Call,
            }
        };
        Ok(Self {
            commitment: MultisigTxCommitment::new(multisig_address, owners, inner)?,
            recipient,
            asset_id,
            amount,
        })
    }

    #[must_use]
    pub fn recipient(&self) -> Address {
        self.recipient
    }

    #[must_use]
    pub fn asset_id(&self) -> Address {
        self.asset_id
    }

    #[must_use]
    pub fn amount(&self) -> U256 {
        self.amount
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

    /// The broadcastable transaction; fails unless fully signed.
    pub fn signed_transaction(&self) -> Result<MultisigTransaction, CommitmentError> {
        self.commitment.signed_transaction()
    }
}
