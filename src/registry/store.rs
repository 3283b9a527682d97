//! Stream registry implementation
//!
//! The authoritative view of which streams exist and who is attached to
//! them. The registry has no interior locking: it is owned by the event
//! loop, which is its only reader and writer.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::session::{Publisher, Puller, Subscriber};
use crate::stats::{PublisherSnapshot, StreamSnapshot};

use super::entry::{StreamEntry, WaitingSubscriber};
use super::path::StreamPath;

/// Registry of active streams, waiting subscribers and relay pulls
#[derive(Default)]
pub struct StreamRegistry {
    /// Active streams by path
    streams: HashMap<StreamPath, StreamEntry>,

    /// Subscribers waiting for a publisher, by path, in arrival order
    waiting: HashMap<StreamPath, Vec<WaitingSubscriber>>,

    /// Active relay pulls by path
    pulls: HashMap<StreamPath, Arc<Puller>>,

    /// Live publishers (registered and not yet terminated)
    publishers: IndexMap<u64, Arc<Publisher>>,

    /// Live subscribers (registered and not yet terminated)
    subscribers: IndexMap<u64, Arc<Subscriber>>,

    /// Live pullers
    pullers: Vec<Arc<Puller>>,

    last_publisher_id: u64,
    last_subscriber_id: u64,
}

impl StreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a publisher
    ///
    /// Fails with `StreamExists` if the path is taken and the publisher
    /// doesn't have `kick_exist` set. With `kick_exist`, the current
    /// publisher is stopped and its subscribers and tracks move to the new
    /// one. Subscribers waiting on the path are attached.
    pub fn on_publish(&mut self, publisher: &Arc<Publisher>, now: Instant) -> Result<()> {
        let path = publisher.stream_path().clone();

        if self.streams.contains_key(&path) && !publisher.kick_exist() {
            return Err(Error::StreamExists(path));
        }

        let mut entry = StreamEntry::new(Arc::clone(publisher));

        if let Some(old) = self.streams.remove(&path) {
            tracing::warn!(
                stream = %path,
                publisher = old.publisher.id(),
                subscribers = old.subscriber_count(),
                "Kicking existing publisher"
            );
            old.publisher.stop(Error::Kicked);
            self.release_pull(&old.publisher);
            publisher.take_over(&old.publisher);
            // The old entry is consumed here, so the kicked publisher's own
            // unpublish finds no subscribers to move.
            for subscriber in old.subscribers.into_values() {
                entry.attach(subscriber);
            }
        }

        self.last_publisher_id += 1;
        let id = self.last_publisher_id;
        publisher.activate(id, now);
        self.publishers.insert(id, Arc::clone(publisher));

        if let Some(waiting) = self.waiting.remove(&path) {
            let previous = waiting
                .first()
                .and_then(|w| w.subscriber.publisher())
                .filter(|p| !Arc::ptr_eq(p, publisher));
            if let Some(previous) = previous {
                publisher.take_over(&previous);
            }
            for waiter in waiting {
                entry.attach(waiter.subscriber);
            }
        }

        tracing::info!(
            stream = %path,
            publisher = id,
            plugin = publisher.plugin(),
            subscribers = entry.subscriber_count(),
            "Publisher registered"
        );

        self.streams.insert(path, entry);
        Ok(())
    }

    /// Remove a publisher from the stream map
    ///
    /// Attached subscribers move to the waiting queue with a fresh grace
    /// window instead of being stopped. A publisher that was already
    /// replaced leaves its successor untouched.
    pub fn on_unpublish(&mut self, publisher: &Arc<Publisher>, now: Instant) {
        let path = publisher.stream_path();

        let owns_stream = self
            .streams
            .get(path)
            .is_some_and(|entry| Arc::ptr_eq(&entry.publisher, publisher));

        if owns_stream {
            if let Some(entry) = self.streams.remove(path) {
                let deadline = now + publisher.config().wait_close_timeout;
                if !entry.subscribers.is_empty() {
                    let queue = self.waiting.entry(path.clone()).or_default();
                    queue.extend(
                        entry
                            .subscribers
                            .into_values()
                            .map(|subscriber| WaitingSubscriber::new(subscriber, deadline)),
                    );
                }
            }
        }

        tracing::info!(
            stream = %path,
            publisher = publisher.id(),
            reason = ?publisher.stop_reason(),
            streams = self.stream_count(),
            waiting = self.waiting.get(path).map_or(0, Vec::len),
            "Publisher unpublished"
        );

        publisher.close();
        self.release_pull(publisher);
    }

    /// Forget the pull backed by `publisher`, if it still owns its path
    fn release_pull(&mut self, publisher: &Arc<Publisher>) {
        let path = publisher.stream_path();
        let owns_pull = self
            .pulls
            .get(path)
            .is_some_and(|puller| Arc::ptr_eq(puller.publisher(), publisher));
        if owns_pull {
            if let Some(puller) = self.pulls.remove(path) {
                self.pullers.retain(|p| !Arc::ptr_eq(p, &puller));
                tracing::info!(stream = %path, remote = puller.remote_url(), "Pull removed");
            }
        }
    }

    /// Register a subscriber
    ///
    /// Attaches to the active publisher if there is one, otherwise queues
    /// the subscriber until a publisher appears or the wait times out.
    pub fn on_subscribe(&mut self, subscriber: &Arc<Subscriber>, now: Instant) -> Result<()> {
        self.last_subscriber_id += 1;
        let id = self.last_subscriber_id;
        subscriber.assign_id(id);
        self.subscribers.insert(id, Arc::clone(subscriber));

        let path = subscriber.stream_path();
        if let Some(entry) = self.streams.get_mut(path) {
            entry.attach(Arc::clone(subscriber));
            tracing::info!(
                stream = %path,
                subscriber = id,
                publisher = entry.publisher.id(),
                "Subscriber attached"
            );
        } else {
            let deadline = now + subscriber.config().wait_timeout;
            self.waiting
                .entry(path.clone())
                .or_default()
                .push(WaitingSubscriber::new(Arc::clone(subscriber), deadline));
            tracing::info!(stream = %path, subscriber = id, "Subscriber waiting for publisher");
        }

        Ok(())
    }

    /// Detach a subscriber from wherever it is registered
    pub fn on_unsubscribe(&mut self, subscriber: &Arc<Subscriber>) {
        let path = subscriber.stream_path();
        let id = subscriber.id();

        subscriber.close();

        if let Some(entry) = self.streams.get_mut(path) {
            entry.subscribers.shift_remove(&id);
        }

        if let Some(queue) = self.waiting.get_mut(path) {
            if let Some(index) = queue
                .iter()
                .position(|w| Arc::ptr_eq(&w.subscriber, subscriber))
            {
                queue.remove(index);
            }
            if queue.is_empty() {
                self.waiting.remove(path);
            }
        }

        subscriber.set_publisher(None);

        tracing::info!(
            stream = %path,
            subscriber = id,
            reason = ?subscriber.stop_reason(),
            "Subscriber removed"
        );
    }

    /// Register a relay pull
    ///
    /// Fails with `StreamExists` if a pull is already active for the path,
    /// before the stream map is touched.
    pub fn on_pull(&mut self, puller: &Arc<Puller>, now: Instant) -> Result<()> {
        let path = puller.stream_path();
        if self.pulls.contains_key(path) {
            return Err(Error::StreamExists(path.clone()));
        }

        self.on_publish(puller.publisher(), now)?;

        self.pulls.insert(path.clone(), Arc::clone(puller));
        self.pullers.push(Arc::clone(puller));
        tracing::info!(stream = %path, remote = puller.remote_url(), "Pull registered");
        Ok(())
    }

    /// Unpublish and forget a terminated publisher
    pub fn remove_publisher(&mut self, id: u64, now: Instant) -> Option<Arc<Publisher>> {
        let publisher = self.publishers.shift_remove(&id)?;
        self.on_unpublish(&publisher, now);
        Some(publisher)
    }

    /// Unsubscribe and forget a terminated subscriber
    pub fn remove_subscriber(&mut self, id: u64) -> Option<Arc<Subscriber>> {
        let subscriber = self.subscribers.shift_remove(&id)?;
        self.on_unsubscribe(&subscriber);
        Some(subscriber)
    }

    /// Timeout sweep run on every pulse
    ///
    /// Stops idle publishers and subscribers whose wait window elapsed.
    /// Removal happens later, when their termination is observed.
    /// Returns the number of entities stopped by this sweep.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut stopped = 0;

        for entry in self.streams.values() {
            if let Err(err) = entry.publisher.check_timeout(now) {
                if entry.publisher.stop(err) {
                    tracing::warn!(
                        stream = %entry.publisher.stream_path(),
                        publisher = entry.publisher.id(),
                        "Publisher timed out"
                    );
                    stopped += 1;
                }
            }
        }

        for waiter in self.waiting.values().flatten() {
            if waiter.is_expired(now) && waiter.subscriber.stop(Error::SubscribeTimeout) {
                tracing::warn!(
                    stream = %waiter.subscriber.stream_path(),
                    subscriber = waiter.subscriber.id(),
                    "Subscriber wait timed out"
                );
                stopped += 1;
            }
        }

        stopped
    }

    /// Active publisher for a path
    pub fn publisher(&self, path: &StreamPath) -> Option<&Arc<Publisher>> {
        self.streams.get(path).map(|entry| &entry.publisher)
    }

    /// Live subscriber by ID
    pub fn find_subscriber(&self, id: u64) -> Option<&Arc<Subscriber>> {
        self.subscribers.get(&id)
    }

    /// IDs of subscribers attached to the publisher of `path`
    pub fn attached(&self, path: &StreamPath) -> Vec<u64> {
        self.streams
            .get(path)
            .map(|entry| entry.subscribers.keys().copied().collect())
            .unwrap_or_default()
    }

    /// IDs of subscribers waiting on `path`, in arrival order
    pub fn waiting(&self, path: &StreamPath) -> Vec<u64> {
        self.waiting
            .get(path)
            .map(|queue| queue.iter().map(|w| w.subscriber.id()).collect())
            .unwrap_or_default()
    }

    /// Live publishers in registration order
    pub fn live_publishers(&self) -> impl Iterator<Item = &Arc<Publisher>> {
        self.publishers.values()
    }

    /// Live subscribers in registration order
    pub fn live_subscribers(&self) -> impl Iterator<Item = &Arc<Subscriber>> {
        self.subscribers.values()
    }

    /// Live pullers
    pub fn pullers(&self) -> &[Arc<Puller>] {
        &self.pullers
    }

    /// Active pull for a path
    pub fn pull(&self, path: &StreamPath) -> Option<&Arc<Puller>> {
        self.pulls.get(path)
    }

    /// Number of streams with an active publisher
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Snapshot of one path
    pub fn snapshot(&self, path: &StreamPath) -> StreamSnapshot {
        let publisher = self.streams.get(path).map(|entry| PublisherSnapshot {
            id: entry.publisher.id(),
            plugin: entry.publisher.plugin().to_string(),
            kick_exist: entry.publisher.kick_exist(),
            subscribers: entry.subscribers.keys().copied().collect(),
            tracks: entry.publisher.track_kinds(),
            uptime_ms: entry
                .publisher
                .uptime()
                .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            pull_url: self
                .pulls
                .get(path)
                .filter(|p| Arc::ptr_eq(p.publisher(), &entry.publisher))
                .map(|p| p.remote_url().to_string()),
        });

        StreamSnapshot {
            stream_path: path.clone(),
            publisher,
            waiting: self.waiting(path),
        }
    }

    /// Snapshots of every known path (active or waiting), sorted by path
    pub fn snapshots(&self) -> Vec<StreamSnapshot> {
        let paths: BTreeSet<&StreamPath> = self.streams.keys().chain(self.waiting.keys()).collect();
        paths.into_iter().map(|path| self.snapshot(path)).collect()
    }
}
