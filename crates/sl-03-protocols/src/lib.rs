//! # sl-03-protocols
//!
//! The protocol state machines that advance a channel: setup, propose,
//! install, take-action, uninstall, and sync.
//!
//! ## Common shape
//!
//! `Started -> AwaitingCounterpartySignature -> Committed`, or `Aborted`
//! at any round. Each round computes the proposed next aggregate and its
//! commitments locally, signs, exchanges, verifies the counterparty's
//! signature against its known signer address, and persists atomically on
//! quorum. A verification failure aborts without persisting; the channel
//! stays at its last committed state, recoverable via sync.
//!
//! ## Layout
//!
//! - `ports`: the narrow collaborator interfaces the machines consume
//! - `domain`: the machines, the runner, validation, errors
//! - `adapters`: in-memory implementations of every port

pub mod adapters;
pub mod domain;
pub mod ports;

pub use domain::*;
