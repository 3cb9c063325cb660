//! # Bounded Seen-Id Cache
//!
//! Replay protection for protocol envelopes: the bus remembers the last N
//! envelope ids and silently drops re-publications. Bounded so a chatty
//! peer cannot grow memory without limit.

use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// Default number of envelope ids remembered.
pub const DEFAULT_SEEN_CAPACITY: usize = 4096;

/// FIFO-evicting set of recently seen envelope ids.
#[derive(Debug)]
pub struct BoundedSeenCache {
    order: VecDeque<Uuid>,
    seen: HashSet<Uuid>,
    capacity: usize,
}

impl BoundedSeenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SEEN_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record an id. Returns `false` if the id was already present
    /// (a replay), `true` if it is fresh.
    pub fn insert(&mut self, id: Uuid) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for BoundedSeenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_is_detected() {
        let mut cache = BoundedSeenCache::new();
        let id = Uuid::new_v4();
        assert!(cache.insert(id));
        assert!(!cache.insert(id));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut cache = BoundedSeenCache::with_capacity(2);
        let first = Uuid::new_v4();
        cache.insert(first);
        cache.insert(Uuid::new_v4());
        cache.insert(Uuid::new_v4());

        assert_eq!(cache.len(), 2);
        // Evicted ids are accepted again
        assert!(cache.insert(first));
    }
}
