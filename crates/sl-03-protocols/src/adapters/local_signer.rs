//! # Local Signer Adapter
//!
//! Signer port backed by an in-process secp256k1 keypair. Production
//! deployments would put a remote keystore behind the same port.

use async_trait::async_trait;

use shared_crypto::ChannelKeypair;
use shared_types::{Address, Bytes32, PublicIdentifier, SignatureBytes};

use crate::ports::{ChannelSigner, SignerError};

/// Signs with a locally held keypair.
pub struct LocalChannelSigner {
    keypair: ChannelKeypair,
}

impl LocalChannelSigner {
    #[must_use]
    pub fn new(keypair: ChannelKeypair) -> Self {
        Self { keypair }
    }

    #[must_use]
    pub fn random() -> Self {
        Self::new(ChannelKeypair::generate())
    }
}

#[async_trait]
impl ChannelSigner for LocalChannelSigner {
    fn public_identifier(&self) -> PublicIdentifier {
        self.keypair.public_identifier()
    }

    fn address(&self) -> Address {
        self.keypair.address()
    }

    async fn sign(&self, digest: &Bytes32) -> Result<SignatureBytes, SignerError> {
        self.keypair
            .sign_digest(digest)
            .map_err(|err| SignerError::SigningFailed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::recover_address;

    #[tokio::test]
    async fn test_signatures_recover_to_reported_address() {
        let signer = LocalChannelSigner::random();
        let digest = shared_crypto::keccak256(b"digest");

        let signature = signer.sign(&digest).await.unwrap();
        assert_eq!(recover_address(&digest, &signature).unwrap(), signer.address());
        assert_eq!(
            shared_crypto::signer_address_of(&signer.public_identifier()).unwrap(),
            signer.address()
        );
    }
}
