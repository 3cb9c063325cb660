//! # Keccak-256 Hashing
//!
//! All digests in the channel engine are keccak-256 (the Ethereum variant,
//! not NIST SHA-3).

use sha3::{Digest, Keccak256};
use shared_types::Bytes32;

/// Compute the keccak-256 digest of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> Bytes32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Bytes32(hasher.finalize().into())
}

/// Compute the keccak-256 digest of the concatenation of `parts`.
#[must_use]
pub fn keccak256_concat(parts: &[&[u8]]) -> Bytes32 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    Bytes32(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty_vector() {
        // keccak256("") per the Ethereum yellow paper
        assert_eq!(
            keccak256(b"").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a456"
        );
    }

    #[test]
    fn test_keccak256_known_vector() {
        assert_eq!(
            keccak256(b"hello").to_string(),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_concat_matches_single_buffer() {
        assert_eq!(keccak256_concat(&[b"he", b"llo"]), keccak256(b"hello"));
    }
}
