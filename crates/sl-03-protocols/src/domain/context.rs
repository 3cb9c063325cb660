//! # Protocol Execution Context
//!
//! Everything a protocol machine touches while running: the collaborator
//! ports, the network context, and the per-round timeout policy. Also the
//! small state tracker that makes the `Started ->
//! AwaitingCounterpartySignature -> Committed | Aborted` lifecycle
//! explicit in logs.

use std::sync::Arc;
use std::time::Duration;

use shared_types::{Address, NetworkContext, ProtocolName};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ports::{
    AppLogic, AppRegistry, ChainProvider, ChannelSigner, MessagingService, StateChannelStore,
};

/// Timeout policy for protocol execution.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolTimeouts {
    /// Budget for one countersignature round trip.
    pub round_timeout: Duration,
}

impl Default for ProtocolTimeouts {
    fn default() -> Self {
        Self {
            round_timeout: Duration::from_secs(90),
        }
    }
}

/// Shared collaborator handles for protocol machines.
#[derive(Clone)]
pub struct ProtocolContext {
    pub network: NetworkContext,
    pub store: Arc<dyn StateChannelStore>,
    pub messaging: Arc<dyn MessagingService>,
    pub signer: Arc<dyn ChannelSigner>,
    pub app_registry: Arc<dyn AppRegistry>,
    pub app_logic: Arc<dyn AppLogic>,
    pub chain: Arc<dyn ChainProvider>,
    pub timeouts: ProtocolTimeouts,
}

/// Lifecycle states of one protocol execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Started,
    AwaitingCounterpartySignature,
    Committed,
    Aborted,
}

/// Tracks and logs one execution's state transitions.
#[derive(Debug)]
pub struct Execution {
    protocol: ProtocolName,
    multisig_address: Address,
    process_id: Uuid,
    state: ProtocolState,
}

impl Execution {
    #[must_use]
    pub fn start(protocol: ProtocolName, multisig_address: Address, process_id: Uuid) -> Self {
        debug!(
            %protocol,
            %multisig_address,
            %process_id,
            "Protocol started"
        );
        Self {
            protocol,
            multisig_address,
            process_id,
            state: ProtocolState::Started,
        }
    }

    #[must_use]
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    #[must_use]
    pub fn process_id(&self) -> Uuid {
        self.process_id
    }

    /// Entering the round-trip wait for the counterparty's signature.
    pub fn awaiting_counterparty(&mut self) {
        self.state = ProtocolState::AwaitingCounterpartySignature;
        debug!(
            protocol = %self.protocol,
            multisig_address = %self.multisig_address,
            process_id = %self.process_id,
            "Awaiting counterparty signature"
        );
    }

    /// Terminal success: the new state is durably committed.
    pub fn committed(&mut self) {
        self.state = ProtocolState::Committed;
        debug!(
            protocol = %self.protocol,
            multisig_address = %self.multisig_address,
            process_id = %self.process_id,
            "Protocol committed"
        );
    }

    /// Terminal failure: nothing was persisted in this execution.
    pub fn aborted(&mut self, reason: &dyn std::fmt::Display) {
        self.state = ProtocolState::Aborted;
        warn!(
            protocol = %self.protocol,
            multisig_address = %self.multisig_address,
            process_id = %self.process_id,
            %reason,
            "Protocol aborted; persisted state untouched"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_state_transitions() {
        let mut execution = Execution::start(
            ProtocolName::Install,
            Address([0x07; 20]),
            Uuid::new_v4(),
        );
        assert_eq!(execution.state(), ProtocolState::Started);

        execution.awaiting_counterparty();
        assert_eq!(execution.state(), ProtocolState::AwaitingCounterpartySignature);

        execution.committed();
        assert_eq!(execution.state(), ProtocolState::Committed);
    }

    #[test]
    fn test_default_round_timeout() {
        assert_eq!(ProtocolTimeouts::default().round_timeout, Duration::from_secs(90));
    }
}
