//! # Shared Bus - In-Process Channel Messaging
//!
//! Bounded pub/sub bus carrying two kinds of traffic:
//!
//! - **Transport**: protocol envelopes addressed to a peer identifier.
//!   Delivery is reliable within a process lifetime only; peers reconcile
//!   anything lost across restarts with the sync protocol.
//! - **Engine notifications**: out-of-band completion events for
//!   subscribers (propose received, install completed, sync received).
//!
//! ## Backpressure
//!
//! Every subscriber has a bounded queue. A lagging subscriber loses the
//! oldest events and keeps receiving; publishers never block.
//!
//! ## Replay Protection
//!
//! Protocol envelopes carry a unique id; the bus keeps a bounded cache of
//! recently seen ids and drops re-publications.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod seen_cache;
pub mod subscriber;

// Re-export main types
pub use events::{ChannelEvent, EventFilter, EventTopic, NodeEnvelope};
pub use publisher::{EventPublisher, InMemoryChannelBus};
pub use seen_cache::BoundedSeenCache;
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
