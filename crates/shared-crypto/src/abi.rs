//! # Solidity ABI Encoding
//!
//! Minimal ABI encoder covering the value shapes the commitment builders
//! emit: addresses, uint256, bytes32, dynamic bytes, and address arrays.
//! Supports both the standard head/tail encoding used for calldata and
//! the packed encoding used inside commitment digests.

use primitive_types::U256;
use shared_types::{Address, Bytes32};

use crate::hashing::keccak256;

/// One ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    FixedBytes(Bytes32),
    /// Dynamic `bytes`.
    Bytes(Vec<u8>),
    /// Dynamic `address[]`.
    AddressArray(Vec<Address>),
    /// Dynamic `uint256[]`.
    UintArray(Vec<U256>),
    /// `uint8`, used for multisig operation flags.
    Uint8(u8),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(
            self,
            Token::Bytes(_) | Token::AddressArray(_) | Token::UintArray(_)
        )
    }

    /// 32-byte head word for static tokens.
    fn head_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Token::Address(addr) => word[12..].copy_from_slice(&addr.0),
            Token::Uint(value) => value.to_big_endian(&mut word),
            Token::FixedBytes(bytes) => word.copy_from_slice(&bytes.0),
            Token::Uint8(value) => word[31] = *value,
            Token::Bytes(_) | Token::AddressArray(_) | Token::UintArray(_) => {
                unreachable!("dynamic token has no head")
            }
        }
        word
    }

    /// Tail bytes for dynamic tokens (length-prefixed, 32-byte padded).
    fn tail(&self) -> Vec<u8> {
        match self {
            Token::Bytes(data) => {
                let mut out = Vec::with_capacity(32 + data.len().div_ceil(32) * 32);
                out.extend_from_slice(&Token::Uint(U256::from(data.len())).head_word());
                out.extend_from_slice(data);
                let pad = data.len().div_ceil(32) * 32 - data.len();
                out.extend(std::iter::repeat(0u8).take(pad));
                out
            }
            Token::AddressArray(addrs) => {
                let mut out = Vec::with_capacity(32 + addrs.len() * 32);
                out.extend_from_slice(&Token::Uint(U256::from(addrs.len())).head_word());
                for addr in addrs {
                    out.extend_from_slice(&Token::Address(*addr).head_word());
                }
                out
            }
            Token::UintArray(values) => {
                let mut out = Vec::with_capacity(32 + values.len() * 32);
                out.extend_from_slice(&Token::Uint(U256::from(values.len())).head_word());
                for value in values {
                    out.extend_from_slice(&Token::Uint(*value).head_word());
                }
                out
            }
            _ => Vec::new(),
        }
    }
}

/// Standard ABI encoding of a token tuple (head/tail layout).
#[must_use]
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * 32;
    let mut head = Vec::with_capacity(head_len);
    let mut tail: Vec<u8> = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            let mut offset_word = [0u8; 32];
            U256::from(head_len + tail.len()).to_big_endian(&mut offset_word);
            head.extend_from_slice(&offset_word);
            tail.extend_from_slice(&token.tail());
        } else {
            head.extend_from_slice(&token.head_word());
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Packed (non-standard) encoding: values are concatenated at their
/// natural widths with no heads or padding.
#[must_use]
pub fn encode_packed(tokens: &[Token]) -> Vec<u8> {
    let mut out = Vec::new();
    for token in tokens {
        match token {
            Token::Address(addr) => out.extend_from_slice(&addr.0),
            Token::Uint(value) => {
                let mut word = [0u8; 32];
                value.to_big_endian(&mut word);
                out.extend_from_slice(&word);
            }
            Token::FixedBytes(bytes) => out.extend_from_slice(&bytes.0),
            Token::Uint8(value) => out.push(*value),
            Token::Bytes(data) => out.extend_from_slice(data),
            Token::AddressArray(addrs) => {
                for addr in addrs {
                    out.extend_from_slice(&addr.0);
                }
            }
            Token::UintArray(values) => {
                for value in values {
                    let mut word = [0u8; 32];
                    value.to_big_endian(&mut word);
                    out.extend_from_slice(&word);
                }
            }
        }
    }
    out
}

/// 4-byte function selector of a Solidity signature string.
#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest.0[0], digest.0[1], digest.0[2], digest.0[3]]
}

/// ABI-encoded call: selector followed by the encoded argument tuple.
#[must_use]
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + args.len() * 32);
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(&encode(args));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_selector() {
        // Canonical ERC-20 selector
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_static_encoding_is_word_aligned() {
        let encoded = encode(&[
            Token::Address(Address([0x11; 20])),
            Token::Uint(U256::from(5u64)),
        ]);
        assert_eq!(encoded.len(), 64);
        assert_eq!(&encoded[12..32], &[0x11; 20]);
        assert_eq!(encoded[63], 5);
    }

    #[test]
    fn test_dynamic_bytes_offset_and_length() {
        let encoded = encode(&[Token::Uint(U256::one()), Token::Bytes(vec![0xAA; 3])]);
        // head: uint word + offset word; tail: length word + padded data
        assert_eq!(encoded.len(), 32 + 32 + 32 + 32);
        assert_eq!(encoded[63], 64); // offset points past the head
        assert_eq!(encoded[95], 3); // length
        assert_eq!(&encoded[96..99], &[0xAA; 3]);
        assert_eq!(&encoded[99..128], &[0u8; 29]); // padding
    }

    #[test]
    fn test_address_array_encoding() {
        let encoded = encode(&[Token::AddressArray(vec![
            Address([0x01; 20]),
            Address([0x02; 20]),
        ])]);
        assert_eq!(encoded.len(), 32 + 32 + 64);
        assert_eq!(encoded[31], 32); // offset
        assert_eq!(encoded[63], 2); // length
    }

    #[test]
    fn test_packed_encoding_widths() {
        let packed = encode_packed(&[
            Token::Uint8(0x19),
            Token::Address(Address([0x22; 20])),
            Token::Uint(U256::from(1u64)),
            Token::FixedBytes(Bytes32([0x33; 32])),
        ]);
        assert_eq!(packed.len(), 1 + 20 + 32 + 32);
        assert_eq!(packed[0], 0x19);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let tokens = [
            Token::Bytes(vec![1, 2, 3]),
            Token::AddressArray(vec![Address([0x0F; 20])]),
        ];
        assert_eq!(encode(&tokens), encode(&tokens));
    }
}
