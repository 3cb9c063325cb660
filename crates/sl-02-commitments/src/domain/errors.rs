use shared_types::Address;
use thiserror::Error;

/// Errors from commitment construction and signing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    #[error("Commitment has {have} of {need} required signatures")]
    MissingSignatures { have: usize, need: usize },

    #[error("Signer {recovered} is not an owner of multisig {multisig_address}")]
    UnknownSigner {
        recovered: Address,
        multisig_address: Address,
    },

    #[error("Owner {address} already signed this commitment")]
    DuplicateSigner { address: Address },

    #[error("Signature recovered to {recovered}, expected {expected}")]
    SignatureMismatch {
        expected: Address,
        recovered: Address,
    },

    #[error("Commitment requires exactly two owners, got {actual}")]
    InvalidOwnerCount { actual: usize },

    #[error("Crypto error: {0}")]
    Crypto(#[from] shared_crypto::CryptoError),
}
