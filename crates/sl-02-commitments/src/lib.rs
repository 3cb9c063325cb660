//! # sl-02-commitments
//!
//! Commitment builders: the exact transaction payloads both channel
//! owners sign and either can enforce on-chain.
//!
//! ## Builders
//!
//! - `SetupCommitment`: registers free balance outcome resolution at
//!   channel setup
//! - `ConditionalTransactionCommitment`: per-app conditional payout via
//!   its outcome interpreter
//! - `SetStateCommitment`: attestation of one app state version
//! - `WithdrawCommitment`: value transfer out of the multisig
//!
//! Builders never mutate channel state. Structurally invalid inputs fail
//! fast with a typed error; that is a programming-contract violation, not
//! a recoverable runtime condition.

pub mod domain;

pub use domain::*;
