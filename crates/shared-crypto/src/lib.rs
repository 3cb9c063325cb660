//! # shared-crypto
//!
//! Cryptographic primitives for the channel engine.
//!
//! ## Modules
//!
//! - `hashing`: keccak-256 digests
//! - `ecdsa`: recoverable secp256k1 signatures and address derivation
//! - `abi`: minimal Solidity ABI encoding (standard and packed)

pub mod abi;
pub mod ecdsa;
pub mod errors;
pub mod hashing;

pub use ecdsa::{recover_address, signer_address_of, ChannelKeypair};
pub use errors::CryptoError;
pub use hashing::{keccak256, keccak256_concat};
