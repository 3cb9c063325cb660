//! # Primitive Value Types
//!
//! Fixed-size byte newtypes used throughout the channel engine. All of them
//! serialize as `0x`-prefixed hex strings so the persisted channel document
//! never contains raw byte arrays or native floating-point numbers.
//!
//! ## Types
//!
//! - [`Address`]: 20-byte Ethereum-style address
//! - [`Bytes32`]: 32-byte hash (keccak-256 digests, identity hashes)
//! - [`SignatureBytes`]: 65-byte ECDSA signature, `r || s || v` layout
//! - [`PublicIdentifier`]: 33-byte compressed secp256k1 public key that
//!   identifies a channel participant on the wire

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::TypeError;

/// Decode a `0x`-prefixed hex string into exactly `N` bytes.
fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], TypeError> {
    let stripped = s.strip_prefix("0x").ok_or(TypeError::MissingHexPrefix)?;
    let bytes = hex::decode(stripped).map_err(|_| TypeError::InvalidHex(s.to_string()))?;
    if bytes.len() != N {
        return Err(TypeError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn encode_fixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

macro_rules! fixed_bytes_newtype {
    ($name:ident, $len:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// All-zero value.
            #[must_use]
            pub const fn zero() -> Self {
                Self([0u8; $len])
            }

            /// Raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Whether every byte is zero.
            #[must_use]
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", encode_fixed(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), encode_fixed(&self.0))
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(decode_fixed::<$len>(s)?))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&encode_fixed(&self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

fixed_bytes_newtype!(Address, 20, "A 20-byte Ethereum-style address.");
fixed_bytes_newtype!(Bytes32, 32, "A 32-byte value (keccak-256 digest, identity hash).");
fixed_bytes_newtype!(
    SignatureBytes,
    65,
    "A 65-byte ECDSA signature in `r || s || v` layout (v is 27 or 28)."
);
fixed_bytes_newtype!(
    PublicIdentifier,
    33,
    "A channel participant identifier: compressed secp256k1 public key (33 bytes)."
);

impl Default for Address {
    fn default() -> Self {
        Self::zero()
    }
}

impl Default for Bytes32 {
    fn default() -> Self {
        Self::zero()
    }
}

impl SignatureBytes {
    /// The recovery byte `v` (last byte, 27 or 28).
    #[must_use]
    pub fn v(&self) -> u8 {
        self.0[64]
    }
}

/// The zero address, used as the token address of the chain's native asset.
pub const NATIVE_TOKEN_ADDRESS: Address = Address([0u8; 20]);

/// Variable-length byte string that serializes as `0x`-prefixed hex.
///
/// Used for calldata and ABI-encoded payloads inside the persisted channel
/// document.
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", encode_fixed(&self.0))
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexBytes({} bytes)", self.0.len())
    }
}

impl FromStr for HexBytes {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").ok_or(TypeError::MissingHexPrefix)?;
        let bytes = hex::decode(stripped).map_err(|_| TypeError::InvalidHex(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_fixed(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_round_trip() {
        let addr = Address([0xAB; 20]);
        let s = addr.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 42);
        assert_eq!(s.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_rejects_missing_prefix() {
        let err = "abab".parse::<Address>().unwrap_err();
        assert!(matches!(err, TypeError::MissingHexPrefix));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = "0xabab".parse::<Bytes32>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidLength { expected: 32, actual: 2 }));
    }

    #[test]
    fn test_serde_uses_hex_strings() {
        let hash = Bytes32([0x11; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(32)));
        let back: Bytes32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_signature_v_byte() {
        let mut raw = [0u8; 65];
        raw[64] = 28;
        assert_eq!(SignatureBytes(raw).v(), 28);
    }

    #[test]
    fn test_address_ordering_is_bytewise() {
        let lo = Address([0x01; 20]);
        let hi = Address([0x02; 20]);
        assert!(lo < hi);
    }
}
