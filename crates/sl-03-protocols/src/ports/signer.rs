//! # Signer Port
//!
//! The only view the engine has of key material: a participant
//! identifier, its signer address, and digest signing. Recovery is a pure
//! function and lives in shared-crypto.

use async_trait::async_trait;
use thiserror::Error;

use shared_types::{Address, Bytes32, PublicIdentifier, SignatureBytes};

/// Errors from the signing collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Digest signer for one channel participant.
#[async_trait]
pub trait ChannelSigner: Send + Sync {
    /// This participant's wire identifier.
    fn public_identifier(&self) -> PublicIdentifier;

    /// The signer address counterparties verify against.
    fn address(&self) -> Address;

    /// Sign a 32-byte commitment digest.
    async fn sign(&self, digest: &Bytes32) -> Result<SignatureBytes, SignerError>;
}
