//! # sl-01-channel-model
//!
//! The in-memory channel data model.
//!
//! ## Role in System
//!
//! - **Pure aggregate**: `StateChannel` composes the free balance with
//!   installed and proposed apps; every transition returns a new value
//! - **Functional updates**: protocol machines hold a transient checked
//!   out copy while a lock is held and commit a whole new aggregate, so
//!   readers never observe partial writes
//!
//! ## Key Invariants
//!
//! - The free balance app is always present and never uninstallable
//! - An app's funding debit and its activation commit together
//! - Version numbers and the proposal counter only move forward

pub mod domain;

pub use domain::*;
