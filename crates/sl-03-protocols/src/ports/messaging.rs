//! # Messaging Port
//!
//! Request/response and fire-and-forget delivery of protocol messages,
//! addressed by counterparty identifier. Delivery is reliable within a
//! process lifetime but not across restarts; the sync protocol reconciles
//! the difference.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use shared_types::{ProtocolMessage, ProtocolName};

/// Errors from the messaging collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// The counterparty did not answer within the round timeout. The
    /// protocol aborts without committing; the channel stays at its last
    /// committed state.
    #[error("Timed out waiting for {protocol} round {awaited_seq} response")]
    Timeout {
        protocol: ProtocolName,
        awaited_seq: u8,
    },

    #[error("Messaging transport closed")]
    TransportClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Peer-to-peer protocol message transport.
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Fire-and-forget send to `message.to`.
    async fn send(&self, message: ProtocolMessage) -> Result<(), MessagingError>;

    /// Send and await the counterparty's next round: the response must
    /// carry the same process id and `message.seq + 1`.
    async fn send_and_wait(
        &self,
        message: ProtocolMessage,
        timeout: Duration,
    ) -> Result<ProtocolMessage, MessagingError>;
}
