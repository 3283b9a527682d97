//! Registry entry types
//!
//! Per-stream state stored in the registry: the active publisher with its
//! attached subscriber set, and the queue entries of waiting subscribers.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::time::Instant;

use crate::session::{Publisher, Subscriber};

/// Entry for a stream with an active publisher
pub struct StreamEntry {
    /// Current publisher
    pub publisher: Arc<Publisher>,

    /// Attached subscribers, keyed by ID in attach order
    pub subscribers: IndexMap<u64, Arc<Subscriber>>,
}

impl StreamEntry {
    pub(super) fn new(publisher: Arc<Publisher>) -> Self {
        Self {
            publisher,
            subscribers: IndexMap::new(),
        }
    }

    /// Attach a subscriber and point it at this entry's publisher
    pub(super) fn attach(&mut self, subscriber: Arc<Subscriber>) {
        subscriber.set_publisher(Some(Arc::clone(&self.publisher)));
        self.subscribers.insert(subscriber.id(), subscriber);
    }

    /// Number of attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Subscriber queued for a stream without a publisher
pub struct WaitingSubscriber {
    /// The waiting subscriber
    pub subscriber: Arc<Subscriber>,

    /// When the subscriber gives up waiting
    pub deadline: Instant,
}

impl WaitingSubscriber {
    pub(super) fn new(subscriber: Arc<Subscriber>, deadline: Instant) -> Self {
        Self {
            subscriber,
            deadline,
        }
    }

    /// Whether the wait window has elapsed
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}
