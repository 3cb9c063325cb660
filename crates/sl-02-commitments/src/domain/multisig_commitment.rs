//! # Multisig Commitment Core
//!
//! Shared machinery for commitments that resolve to a multisig
//! transaction: the `0x19`-prefixed packed digest both owners sign, the
//! two-slot signature accumulator ordered by sorted owner address, and
//! the wrapping of a fully-signed inner transaction into an
//! `execTransaction` call against the multisig.

use shared_crypto::abi::{self, Token};
use shared_crypto::{keccak256, recover_address};
use shared_types::{
    Address, Bytes32, MultisigOperation, MultisigTransaction, SignatureBytes, U256,
};

use super::errors::CommitmentError;

/// Digest of a multisig transaction:
/// `keccak256(0x19 ++ multisig ++ to ++ value ++ keccak256(data) ++ op)`.
#[must_use]
pub fn multisig_tx_digest(multisig_address: Address, tx: &MultisigTransaction) -> Bytes32 {
    keccak256(&abi::encode_packed(&[
        Token::Uint8(0x19),
        Token::Address(multisig_address),
        Token::Address(tx.to),
        Token::Uint(tx.value),
        Token::FixedBytes(keccak256(tx.data.as_slice())),
        Token::Uint8(tx.operation.as_u8()),
    ]))
}

/// Two signature slots, one per multisig owner, in sorted-address order.
///
/// Signatures are only accepted if they recover to one of the owners over
/// the commitment digest, so a slot being filled implies the signature
/// already verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSignatures {
    /// Owners sorted ascending by address; fixes slot order.
    owners: [Address; 2],
    slots: [Option<SignatureBytes>; 2],
}

impl OwnerSignatures {
    /// Create empty slots for the given owners (any order).
    pub fn new(owners: &[Address]) -> Result<Self, CommitmentError> {
        if owners.len() != 2 {
            return Err(CommitmentError::InvalidOwnerCount {
                actual: owners.len(),
            });
        }
        let mut sorted = [owners[0], owners[1]];
        sorted.sort();
        Ok(Self {
            owners: sorted,
            slots: [None, None],
        })
    }

    /// Owners in slot order.
    #[must_use]
    pub fn owners(&self) -> [Address; 2] {
        self.owners
    }

    /// Verify `signature` over `digest` and place it in its owner's slot.
    pub fn add(
        &mut self,
        digest: &Bytes32,
        signature: SignatureBytes,
        multisig_address: Address,
    ) -> Result<Address, CommitmentError> {
        let recovered = recover_address(digest, &signature)?;
        let index = self
            .owners
            .iter()
            .position(|owner| *owner == recovered)
            .ok_or(CommitmentError::UnknownSigner {
                recovered,
                multisig_address,
            })?;
        if self.slots[index].is_some() {
            return Err(CommitmentError::DuplicateSigner { address: recovered });
        }
        self.slots[index] = Some(signature);
        Ok(recovered)
    }

    /// Whether both owners have signed.
    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Present signatures in slot order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<SignatureBytes> {
        self.slots.iter().flatten().copied().collect()
    }

    /// Re-verify every stored signature against `digest`.
    ///
    /// Used when rehydrating commitments received from a counterparty
    /// (sync) where slot contents cannot be trusted.
    pub fn verify_full(
        &self,
        digest: &Bytes32,
        multisig_address: Address,
    ) -> Result<(), CommitmentError> {
        let have = self.slots.iter().flatten().count();
        if have != 2 {
            return Err(CommitmentError::MissingSignatures { have, need: 2 });
        }
        for (owner, slot) in self.owners.iter().zip(&self.slots) {
            let signature = slot.as_ref().ok_or(CommitmentError::MissingSignatures {
                have,
                need: 2,
            })?;
            let recovered = recover_address(digest, signature)?;
            if recovered != *owner {
                return Err(CommitmentError::UnknownSigner {
                    recovered,
                    multisig_address,
                });
            }
        }
        Ok(())
    }

    /// Rebuild slots from a signature list by recovering each signer.
    pub fn from_signatures(
        owners: &[Address],
        digest: &Bytes32,
        signatures: &[SignatureBytes],
        multisig_address: Address,
    ) -> Result<Self, CommitmentError> {
        let mut slots = Self::new(owners)?;
        for signature in signatures {
            slots.add(digest, *signature, multisig_address)?;
        }
        Ok(slots)
    }
}

/// A commitment that resolves to one multisig transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigTxCommitment {
    multisig_address: Address,
    inner: MultisigTransaction,
    signatures: OwnerSignatures,
}

impl MultisigTxCommitment {
    pub fn new(
        multisig_address: Address,
        owners: &[Address],
        inner: MultisigTransaction,
    ) -> Result<Self, CommitmentError> {
        Ok(Self {
            multisig_address,
            inner,
            signatures: OwnerSignatures::new(owners)?,
        })
    }

    #[must_use]
    pub fn multisig_address(&self) -> Address {
        self.multisig_address
    }

    #[must_use]
    pub fn inner_transaction(&self) -> &MultisigTransaction {
        &self.inner
    }

    #[must_use]
    pub fn signatures(&self) -> &OwnerSignatures {
        &self.signatures
    }

    /// The digest both owners sign.
    #[must_use]
    pub fn hash_to_sign(&self) -> Bytes32 {
        multisig_tx_digest(self.multisig_address, &self.inner)
    }

    /// Verify and store a signature.
    pub fn add_signature(&mut self, signature: SignatureBytes) -> Result<Address, CommitmentError> {
        let digest = self.hash_to_sign();
        self.signatures.add(&digest, signature, self.multisig_address)
    }

    /// The broadcastable transaction: `execTransaction` against the
    /// multisig carrying the inner descriptor plus both signatures.
    ///
    /// Fails unless fully signed.
    pub fn signed_transaction(&self) -> Result<MultisigTransaction, CommitmentError> {
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
            "execTransaction(address,uint256,bytes,uint8,bytes)",
            &[
                Token::Address(self.inner.to),
                Token::Uint(self.inner.value),
                Token::Bytes(self.inner.data.0.clone()),
                Token::Uint8(self.inner.operation.as_u8()),
                Token::Bytes(packed_signatures),
            ],
        );
        Ok(MultisigTransaction {
            to: self.multisig_address,
            value: U256::zero(),
            data: data.into(),
            operation: MultisigOperation::Call,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::ChannelKeypair;

    fn inner_tx() -> MultisigTransaction {
        MultisigTransaction {
            to: Address([0x42; 20]),
            value: U256::from(3u64),
            data: vec![0xDE, 0xAD].into(),
            operation: MultisigOperation::DelegateCall,
        }
    }

    fn commitment_with_keys() -> (MultisigTxCommitment, ChannelKeypair, ChannelKeypair) {
        let a = ChannelKeypair::generate();
        let b = ChannelKeypair::generate();
        let commitment = MultisigTxCommitment::new(
            Address([0x99; 20]),
            &[a.address(), b.address()],
            inner_tx(),
        )
        .unwrap();
        (commitment, a, b)
    }

    #[test]
    fn test_digest_is_deterministic() {
        let multisig = Address([0x99; 20]);
        assert_eq!(
            multisig_tx_digest(multisig, &inner_tx()),
            multisig_tx_digest(multisig, &inner_tx())
        );
        // Different multisig, different digest
        assert_ne!(
            multisig_tx_digest(Address([0x98; 20]), &inner_tx()),
            multisig_tx_digest(multisig, &inner_tx())
        );
    }

    #[test]
    fn test_both_owners_reach_quorum() {
        let (mut commitment, a, b) = commitment_with_keys();
        let digest = commitment.hash_to_sign();

        commitment.add_signature(a.sign_digest(&digest).unwrap()).unwrap();
        assert!(!commitment.signatures().is_fully_signed());
        commitment.add_signature(b.sign_digest(&digest).unwrap()).unwrap();
        assert!(commitment.signatures().is_fully_signed());

        let signed = commitment.signed_transaction().unwrap();
        assert_eq!(signed.to, commitment.multisig_address());
        assert_eq!(signed.operation, MultisigOperation::Call);
    }

    #[test]
    fn test_rejects_unknown_signer() {
        let (mut commitment, _, _) = commitment_with_keys();
        let digest = commitment.hash_to_sign();
        let outsider = ChannelKeypair::generate();

        let err = commitment
            .add_signature(outsider.sign_digest(&digest).unwrap())
            .unwrap_err();
        assert!(matches!(err, CommitmentError::UnknownSigner { .. }));
    }

    #[test]
    fn test_rejects_double_signing() {
        let (mut commitment, a, _) = commitment_with_keys();
        let digest = commitment.hash_to_sign();
        let signature = a.sign_digest(&digest).unwrap();

        commitment.add_signature(signature).unwrap();
        let err = commitment.add_signature(signature).unwrap_err();
        assert!(matches!(err, CommitmentError::DuplicateSigner { .. }));
    }

    #[test]
    fn test_signed_transaction_requires_quorum() {
        let (mut commitment, a, _) = commitment_with_keys();
        let digest = commitment.hash_to_sign();
        commitment.add_signature(a.sign_digest(&digest).unwrap()).unwrap();

        let err = commitment.signed_transaction().unwrap_err();
        assert!(matches!(err, CommitmentError::MissingSignatures { have: 1, need: 2 }));
    }

    #[test]
    fn test_verify_full_round_trip() {
        let (mut commitment, a, b) = commitment_with_keys();
        let digest = commitment.hash_to_sign();
        commitment.add_signature(a.sign_digest(&digest).unwrap()).unwrap();
        commitment.add_signature(b.sign_digest(&digest).unwrap()).unwrap();

        let rebuilt = OwnerSignatures::from_signatures(
            &[a.address(), b.address()],
            &digest,
            &commitment.signatures().to_vec(),
            commitment.multisig_address(),
        )
        .unwrap();
        rebuilt.verify_full(&digest, commitment.multisig_address()).unwrap();
    }
}
