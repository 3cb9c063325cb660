//! # Set-State Commitment
//!
//! The off-chain-signed attestation of `(appIdentity, appStateHash,
//! versionNumber, stateTimeout)`. Both parties must sign the identical
//! digest; any divergence is protocol-fatal upstream.

use shared_crypto::abi::{self, Token};
use shared_crypto::{keccak256, recover_address};
use sl_01_channel_model::app_identity_hash;
use shared_types::{
    Address, AppIdentity, Bytes32, MultisigOperation, MultisigTransaction,
    SetStateCommitmentJson, SignatureBytes, U256,
};

use super::errors::CommitmentError;
use super::multisig_commitment::OwnerSignatures;

/// Digest of a set-state attestation:
/// `keccak256(0x19 ++ identityHash ++ version ++ timeout ++ stateHash)`.
#[must_use]
pub fn set_state_digest(
    app_identity_hash: Bytes32,
    version_number: u64,
    state_timeout: U256,
    app_state_hash: Bytes32,
) -> Bytes32 {
    keccak256(&abi::encode_packed(&[
        Token::Uint8(0x19),
        Token::FixedBytes(app_identity_hash),
        Token::Uint(U256::from(version_number)),
        Token::Uint(state_timeout),
        Token::FixedBytes(app_state_hash),
    ]))
}

/// Verify that `signature` over `digest` recovers to `expected`.
///
/// The protocol-fatal check of each signing round: the counterparty must
/// have signed exactly this digest with exactly its known signer key.
pub fn assert_signed_by(
    digest: &Bytes32,
    signature: &SignatureBytes,
    expected: Address,
) -> Result<(), CommitmentError> {
    let recovered = recover_address(digest, signature)?;
    if recovered != expected {
        return Err(CommitmentError::SignatureMismatch {
            expected,
            recovered,
        });
    }
    Ok(())
}

/// A jointly-signed attestation of one app state version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetStateCommitment {
    app_identity: AppIdentity,
    app_identity_hash: Bytes32,
    app_state_hash: Bytes32,
    version_number: u64,
    state_timeout: U256,
    challenge_registry_address: Address,
    signatures: OwnerSignatures,
}

impl SetStateCommitment {
    pub fn new(
        challenge_registry_address: Address,
        app_identity: AppIdentity,
        app_state_hash: Bytes32,
        version_number: u64,
        state_timeout: U256,
    ) -> Result<Self, CommitmentError> {
        let signatures = OwnerSignatures::new(&app_identity.participants)?;
        let app_identity_hash = app_identity_hash(&app_identity);
        Ok(Self {
            app_identity,
            app_identity_hash,
            app_state_hash,
            version_number,
            state_timeout,
            challenge_registry_address,
            signatures,
        })
    }

    #[must_use]
    pub fn app_identity(&self) -> &AppIdentity {
        &self.app_identity
    }

    #[must_use]
    pub fn app_identity_hash(&self) -> Bytes32 {
        self.app_identity_hash
    }

    #[must_use]
    pub fn app_state_hash(&self) -> Bytes32 {
        self.app_state_hash
    }

    #[must_use]
    pub fn version_number(&self) -> u64 {
        self.version_number
    }

    #[must_use]
    pub fn state_timeout(&self) -> U256 {
        self.state_timeout
    }

    /// The digest both participants sign.
    #[must_use]
    pub fn hash_to_sign(&self) -> Bytes32 {
        set_state_digest(
            self.app_identity_hash,
            self.version_number,
            self.state_timeout,
            self.app_state_hash,
        )
    }

    /// Verify and store a signature.
    pub fn add_signature(&mut self, signature: SignatureBytes) -> Result<Address, CommitmentError> {
        let digest = self.hash_to_sign();
        self.signatures
            .add(&digest, signature, self.app_identity.multisig_address)
    }

    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        self.signatures.is_fully_signed()
    }

    #[must_use]
    pub fn signatures(&self) -> Vec<SignatureBytes> {
        self.signatures.to_vec()
    }

    /// Re-verify both stored signatures; used on rehydrated commitments.
    pub fn verify_signatures(&self) -> Result<(), CommitmentError> {
        self.signatures
            .verify_full(&self.hash_to_sign(), self.app_identity.multisig_address)
    }

    /// The dispute transaction placing this state on-chain. Fails unless
    /// fully signed.
    pub fn challenge_transaction(&self) -> Result<MultisigTransaction, CommitmentError> {
        let signature_list = self.signatures.to_vec();
        if signature_list.len() != 2 {
            return Err(CommitmentError::MissingSignatures {
                have: signature_list.len(),
                need: 2,
            });
        }
        let mut packed_signatures = Vec::with_capacity(130);
        for signature in &signature_list {
            packed_signatures.extend_from_slice(&signature.0);
        }
        let data = abi::encode_call(
            "setState(bytes32,bytes32,uint256,uint256,bytes)",
            &[
                Token::FixedBytes(self.app_identity_hash),
                Token::FixedBytes(self.app_state_hash),
                Token::Uint(U256::from(self.version_number)),
                Token::Uint(self.state_timeout),
                Token::Bytes(packed_signatures),
            ],
        );
        Ok(MultisigTransaction {
            to: self.challenge_registry_address,
            value: U256::zero(),
            data: data.into(),
            operation: MultisigOperation::Call,
        })
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    #[must_use]
    pub fn to_json(&self) -> SetStateCommitmentJson {
        SetStateCommitmentJson {
            app_identity: self.app_identity.clone(),
            app_identity_hash: self.app_identity_hash,
            app_state_hash: self.app_state_hash,
            challenge_registry_address: self.challenge_registry_address,
            state_timeout: self.state_timeout,
            version_number: self.version_number,
            signatures: self.signatures.to_vec(),
        }
    }

    /// Rehydrate from a persisted or counterparty-supplied document.
    ///
    /// Every included signature is re-verified against the recomputed
    /// digest; nothing in the document is trusted.
    pub fn from_json(json: SetStateCommitmentJson) -> Result<Self, CommitmentError> {
        let mut commitment = Self::new(
            json.challenge_registry_address,
            json.app_identity,
            json.app_state_hash,
            json.version_number,
            json.state_timeout,
        )?;
        for signature in json.signatures {
            commitment.add_signature(signature)?;
        }
        Ok(commitment)
    }
}
