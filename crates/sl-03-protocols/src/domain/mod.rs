pub mod common;
pub mod context;
pub mod errors;
pub mod install;
pub mod propose;
pub mod runner;
pub mod setup;
pub mod sync;
pub mod take_action;
pub mod uninstall;
pub mod validation;

pub use context::{Execution, ProtocolContext, ProtocolState, ProtocolTimeouts};
pub use errors::{ProtocolError, ProtocolRunError};
pub use runner::{channel_lock_name, InboundOutcome, ProtocolOutput, ProtocolRunner};
pub use sync::{sync_decision, SyncDecision, SyncResponse};
