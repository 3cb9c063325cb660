//! # Channel Events
//!
//! Defines everything that flows over the shared bus: protocol envelopes
//! addressed to a peer, and engine notifications addressed to whoever
//! subscribed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_types::{Address, Bytes32, ProtocolMessage, ProtocolName, PublicIdentifier};

/// A protocol message in transit between two peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEnvelope {
    /// Unique per send; the bus drops replays of the same id.
    pub message_id: Uuid,
    pub message: ProtocolMessage,
}

impl NodeEnvelope {
    #[must_use]
    pub fn new(message: ProtocolMessage) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            message,
        }
    }

    #[must_use]
    pub fn recipient(&self) -> PublicIdentifier {
        self.message.to
    }
}

/// All events that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelEvent {
    // =========================================================================
    // TRANSPORT: peer-to-peer protocol messages
    // =========================================================================
    /// A protocol envelope addressed to `envelope.recipient()`.
    Protocol(NodeEnvelope),

    // =========================================================================
    // ENGINE NOTIFICATIONS: out-of-band completion events
    // =========================================================================
    /// The channel was set up and persisted on this node.
    SetupCompleted { multisig_address: Address },

    /// A counterparty proposal was validated and persisted.
    ProposeReceived {
        multisig_address: Address,
        identity_hash: Bytes32,
    },

    /// An app was promoted to active and funded.
    InstallCompleted {
        multisig_address: Address,
        identity_hash: Bytes32,
    },

    /// An app state advanced to a new version.
    TakeActionCompleted {
        multisig_address: Address,
        identity_hash: Bytes32,
        version_number: u64,
    },

    /// An app was removed and its outcome credited to free balance.
    UninstallCompleted {
        multisig_address: Address,
        identity_hash: Bytes32,
    },

    /// A counterparty sync snapshot was processed.
    SyncReceived { multisig_address: Address },

    /// A protocol aborted; persisted state is untouched.
    ProtocolFailed {
        protocol: ProtocolName,
        multisig_address: Address,
        reason: String,
    },
}

/// Coarse event category used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    /// Peer-to-peer protocol envelopes.
    Transport,
    /// Engine notification events.
    Engine,
}

impl ChannelEvent {
    /// The topic this event belongs to.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::Protocol(_) => EventTopic::Transport,
            _ => EventTopic::Engine,
        }
    }
}

/// Subscription filter over topic and, for transport, recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    topic: EventTopic,
    /// Only deliver transport envelopes addressed to this identifier.
    recipient: Option<PublicIdentifier>,
}

impl EventFilter {
    /// All engine notification events.
    #[must_use]
    pub fn engine() -> Self {
        Self {
            topic: EventTopic::Engine,
            recipient: None,
        }
    }

    /// Transport envelopes addressed to `recipient`.
    #[must_use]
    pub fn transport_for(recipient: PublicIdentifier) -> Self {
        Self {
            topic: EventTopic::Transport,
            recipient: Some(recipient),
        }
    }

    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &ChannelEvent) -> bool {
        if event.topic() != self.topic {
            return false;
        }
        match (&self.recipient, event) {
            (Some(recipient), ChannelEvent::Protocol(envelope)) => {
                envelope.recipient() == *recipient
            }
            _ => true,
        }
    }

    /// Stable key used for subscription accounting.
    #[must_use]
    pub fn topic_key(&self) -> String {
        match (&self.topic, &self.recipient) {
            (EventTopic::Transport, Some(recipient)) => format!("transport.{recipient}"),
            (EventTopic::Transport, None) => "transport".to_string(),
            (EventTopic::Engine, _) => "engine".to_string(),
        }
    }
}
