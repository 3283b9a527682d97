//! Termination multiplexer
//!
//! A wait-set over the stop signals of every live publisher and subscriber.
//! Entities are added when the registry accepts them; each fires exactly
//! once and its case leaves the set when it does, so the set always holds
//! one case per live entity.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

use crate::session::{Publisher, Subscriber};

/// Which entity terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// Publisher with the given ID
    Publisher(u64),
    /// Subscriber with the given ID
    Subscriber(u64),
}

/// Dynamically sized wait-set of entity stop signals
#[derive(Default)]
pub struct Terminations {
    pending: FuturesUnordered<BoxFuture<'static, Terminated>>,
    publishers: usize,
    subscribers: usize,
}

impl Terminations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch a registered publisher
    pub fn add_publisher(&mut self, publisher: &Publisher) {
        let id = publisher.id();
        let stopped = publisher.lifecycle().stopped_owned();
        self.pending
            .push(stopped.map(move |_| Terminated::Publisher(id)).boxed());
        self.publishers += 1;
        tracing::debug!(publisher = id, cases = self.len(), "Watching publisher");
    }

    /// Watch a registered subscriber
    pub fn add_subscriber(&mut self, subscriber: &Subscriber) {
        let id = subscriber.id();
        let stopped = subscriber.lifecycle().stopped_owned();
        self.pending
            .push(stopped.map(move |_| Terminated::Subscriber(id)).boxed());
        self.subscribers += 1;
        tracing::debug!(subscriber = id, cases = self.len(), "Watching subscriber");
    }

    /// Next terminated entity
    ///
    /// Resolves to `None` immediately when nothing is watched.
    pub async fn next(&mut self) -> Option<Terminated> {
        let terminated = self.pending.next().await?;
        match terminated {
            Terminated::Publisher(_) => self.publishers -= 1,
            Terminated::Subscriber(_) => self.subscribers -= 1,
        }
        Some(terminated)
    }

    /// Number of watched entities
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn publisher_count(&self) -> usize {
        self.publishers
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::error::Error;
    use crate::server::config::{PublishConfig, SubscribeConfig};

    #[tokio::test]
    async fn test_fires_once_and_shrinks() {
        let mut terminations = Terminations::new();
        let publisher = Publisher::new("test", "cam1", PublishConfig::default());
        publisher.activate(1, Instant::now());
        let subscriber = Subscriber::new("test", "cam1", SubscribeConfig::default());
        subscriber.assign_id(1);

        terminations.add_publisher(&publisher);
        terminations.add_subscriber(&subscriber);
        assert_eq!(terminations.len(), 2);

        subscriber.stop(Error::StoppedByRequest);
        assert_eq!(terminations.next().await, Some(Terminated::Subscriber(1)));
        assert_eq!(terminations.len(), 1);
        assert_eq!(terminations.subscriber_count(), 0);
        assert_eq!(terminations.publisher_count(), 1);

        // Nothing else has fired
        let idle = tokio::time::timeout(Duration::from_millis(10), terminations.next()).await;
        assert!(idle.is_err());

        publisher.stop(Error::Kicked);
        assert_eq!(terminations.next().await, Some(Terminated::Publisher(1)));
        assert!(terminations.is_empty());
        assert_eq!(terminations.next().await, None);
    }

    #[tokio::test]
    async fn test_already_stopped_fires_immediately() {
        let mut terminations = Terminations::new();
        let subscriber = Subscriber::new("test", "cam1", SubscribeConfig::default());
        subscriber.assign_id(7);
        subscriber.stop(Error::Shutdown);

        terminations.add_subscriber(&subscriber);
        assert_eq!(terminations.next().await, Some(Terminated::Subscriber(7)));
    }
}
