//! # Stateline Test Suite
//!
//! Unified test crate containing cross-subsystem channel scenarios.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Two-node channel flows over the shared bus
//!     ├── fixtures.rs   # Node wiring, deterministic keys, funding
//!     ├── channel_setup.rs
//!     ├── propose.rs
//!     ├── install_uninstall.rs
//!     ├── sync.rs
//!     └── challenge.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p sl-tests
//!
//! # By scenario
//! cargo test -p sl-tests integration::install_uninstall
//! ```

#[cfg(test)]
pub mod integration;
