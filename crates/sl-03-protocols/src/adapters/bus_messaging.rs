//! # Bus Messaging Adapter
//!
//! Messaging port over the in-process shared bus. Request/response
//! correlation rides on the protocol message's process id and round
//! number; the response subscription is opened before the request is
//! published so the reply can never be missed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use shared_bus::{ChannelEvent, EventFilter, EventPublisher, InMemoryChannelBus, NodeEnvelope, Subscription};
use shared_types::{ProtocolMessage, PublicIdentifier};

use crate::ports::{MessagingError, MessagingService};

/// Peer messaging for one node over a shared in-process bus.
pub struct BusMessagingService {
    bus: Arc<InMemoryChannelBus>,
    identifier: PublicIdentifier,
}

impl BusMessagingService {
    #[must_use]
    pub fn new(bus: Arc<InMemoryChannelBus>, identifier: PublicIdentifier) -> Self {
        Self { bus, identifier }
    }

    /// Subscription over every protocol envelope addressed to this node;
    /// the engine's inbound loop drains it.
    #[must_use]
    pub fn inbound_subscription(&self) -> Subscription {
        self.bus.subscribe(EventFilter::transport_for(self.identifier))
    }
}

#[async_trait]
impl MessagingService for BusMessagingService {
    async fn send(&self, message: ProtocolMessage) -> Result<(), MessagingError> {
        let receivers = self
            .bus
            .publish(ChannelEvent::Protocol(NodeEnvelope::new(message)))
            .await;
        if receivers == 0 {
            warn!("Protocol message published with no live subscribers");
        }
        Ok(())
    }

    async fn send_and_wait(
        &self,
        message: ProtocolMessage,
        timeout: Duration,
    ) -> Result<ProtocolMessage, MessagingError> {
        let protocol = message.protocol();
        let awaited_seq = message.seq + 1;
        let process_id = message.process_id;

        // Subscribe before publishing so the reply cannot race the
        // subscription.
        let mut subscription = self.bus.subscribe(EventFilter::transport_for(self.identifier));
        self.send(message).await?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(MessagingError::Timeout {
                    protocol,
                    awaited_seq,
                });
            }
            let event = tokio::time::timeout(remaining, subscription.recv())
                .await
                .map_err(|_| MessagingError::Timeout {
                    protocol,
                    awaited_seq,
                })?
                .ok_or(MessagingError::TransportClosed)?;

            if let ChannelEvent::Protocol(envelope) = event {
                if envelope.message.process_id == process_id
                    && envelope.message.seq == awaited_seq
                {
                    return Ok(envelope.message);
                }
            }
        }
    }
}
