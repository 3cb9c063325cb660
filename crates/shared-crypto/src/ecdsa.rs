//! # Recoverable ECDSA Signatures (secp256k1)
//!
//! Channel commitments are signed with Ethereum-style recoverable ECDSA:
//! 65-byte `r || s || v` signatures over 32-byte keccak digests, where
//! `v` is 27 or 28. Verification recovers the signer address from the
//! digest and compares it against a known owner address, so public keys
//! never travel with commitments.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization
//! - Signer addresses derived as `keccak256(uncompressed_pubkey)[12..]`

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use shared_types::{Address, Bytes32, PublicIdentifier, SignatureBytes};
use zeroize::Zeroize;

use crate::errors::CryptoError;
use crate::hashing::keccak256;

/// Derive the Ethereum-style address of a verifying key.
fn address_of_key(key: &VerifyingKey) -> Address {
    let uncompressed = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag byte, hash the 64-byte coordinate pair.
    let digest = keccak256(&uncompressed.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest.0[12..]);
    Address(out)
}

/// Resolve a participant identifier (compressed public key) to its signer
/// address.
pub fn signer_address_of(identifier: &PublicIdentifier) -> Result<Address, CryptoError> {
    let key = VerifyingKey::from_sec1_bytes(&identifier.0)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(address_of_key(&key))
}

/// Recover the signer address of a 65-byte signature over `digest`.
pub fn recover_address(
    digest: &Bytes32,
    signature: &SignatureBytes,
) -> Result<Address, CryptoError> {
    let v = signature.v();
    let recovery_id = match v {
        27 | 28 => RecoveryId::try_from(v - 27).map_err(|_| CryptoError::InvalidRecoveryId(v))?,
        _ => return Err(CryptoError::InvalidRecoveryId(v)),
    };
    let sig =
        Signature::from_slice(&signature.0[..64]).map_err(|_| CryptoError::InvalidSignature)?;
    let key = VerifyingKey::recover_from_prehash(&digest.0, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_of_key(&key))
}

/// A channel participant's secp256k1 keypair.
pub struct ChannelKeypair {
    signing_key: SigningKey,
}

impl ChannelKeypair {
    /// Generate a random keypair.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// The participant identifier: compressed public key (33 bytes).
    ///
    /// # Panics
    ///
    /// This function will not panic - a compressed SEC1 point is always
    /// exactly 33 bytes.
    #[must_use]
    pub fn public_identifier(&self) -> PublicIdentifier {
        let compressed = self.signing_key.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(compressed.as_bytes());
        PublicIdentifier(bytes)
    }

    /// The signer address commitments are verified against.
    #[must_use]
    pub fn address(&self) -> Address {
        address_of_key(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte digest, producing a 65-byte `r || s || v` signature.
    pub fn sign_digest(&self, digest: &Bytes32) -> Result<SignatureBytes, CryptoError> {
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest.0)
            .map_err(|_| CryptoError::InvalidSignature)?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(SignatureBytes(out))
    }
}

impl Drop for ChannelKeypair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}
