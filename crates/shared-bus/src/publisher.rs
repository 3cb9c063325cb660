//! # Event Publisher
//!
//! Defines the publishing side of the channel bus.

use crate::events::{ChannelEvent, EventFilter};
use crate::seen_cache::BoundedSeenCache;
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the event. Replayed
    /// protocol envelopes are dropped and report zero receivers.
    async fn publish(&self, event: ChannelEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the channel bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
/// semantics with a bounded per-subscriber queue: lagging subscribers
/// lose the oldest events rather than blocking publishers. Suitable for
/// single-process operation; the sync protocol reconciles anything a
/// restart loses.
pub struct InMemoryChannelBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<ChannelEvent>,

    /// Seen envelope ids for replay protection.
    seen: Arc<RwLock<BoundedSeenCache>>,

    /// Active subscription count by topic key.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total events published.
    events_published: AtomicU64,
}

impl InMemoryChannelBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with the given per-subscriber queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            seen: Arc::new(RwLock::new(BoundedSeenCache::new())),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let topic_key = filter.topic_key();
        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }
        debug!(topic = %topic_key, "New bus subscription");
        Subscription::new(
            self.sender.subscribe(),
            filter,
            Arc::clone(&self.subscriptions),
            topic_key,
        )
    }

    /// Number of live receivers on the underlying broadcast channel.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryChannelBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryChannelBus {
    async fn publish(&self, event: ChannelEvent) -> usize {
        if let ChannelEvent::Protocol(envelope) = &event {
            let fresh = self
                .seen
                .write()
                .map(|mut cache| cache.insert(envelope.message_id))
                .unwrap_or(true);
            if !fresh {
                warn!(
                    message_id = %envelope.message_id,
                    protocol = %envelope.message.protocol(),
                    "Dropping replayed protocol envelope"
                );
                return 0;
            }
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No subscribers for published event");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
