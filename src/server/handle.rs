//! Client side of the request bridge
//!
//! `ServerHandle` is cheap to clone and is the only way for code outside the
//! event loop to touch registry state. Each call wraps its argument in a
//! [`Promise`], queues it and waits for the loop to complete it. The queue is
//! bounded, so callers stall while it is full.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::promise::Promise;
use crate::registry::StreamPath;
use crate::session::{Lifecycle, Publisher, Puller, Subscriber};
use crate::stats::StreamSnapshot;

use super::request::Request;

/// Path pattern selecting every stream in [`ServerHandle::stream_snap`]
pub const WILDCARD: &str = "*";

/// Handle for issuing requests to a server
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::Sender<Request>,
    root: Arc<RwLock<Lifecycle>>,
    /// Stop cause that arrived while a restart was tearing down
    deferred: Arc<Mutex<Option<Error>>>,
}

impl ServerHandle {
    pub(crate) fn new(tx: mpsc::Sender<Request>) -> Self {
        Self {
            tx,
            root: Arc::new(RwLock::new(Lifecycle::new())),
            deferred: Arc::new(Mutex::new(None)),
        }
    }

    async fn call<T, R>(&self, value: T, wrap: impl FnOnce(Promise<T, R>) -> Request) -> Result<R> {
        let (promise, done) = Promise::new(value);
        self.tx
            .send(wrap(promise))
            .await
            .map_err(|_| Error::ServerClosed)?;
        done.await
    }

    /// Register a publisher
    pub async fn publish(&self, publisher: Arc<Publisher>) -> Result<()> {
        self.call(publisher, Request::Publish).await
    }

    /// Register a subscriber
    pub async fn subscribe(&self, subscriber: Arc<Subscriber>) -> Result<()> {
        self.call(subscriber, Request::Subscribe).await
    }

    /// Register a relay pull
    pub async fn pull(&self, puller: Arc<Puller>) -> Result<()> {
        self.call(puller, Request::Pull).await
    }

    /// Active publisher of a stream path, if any
    pub async fn snapshot(&self, path: impl Into<StreamPath>) -> Result<Option<Arc<Publisher>>> {
        self.call(path.into(), Request::Snapshot).await
    }

    /// Describe one stream path
    pub async fn describe(&self, path: impl Into<StreamPath>) -> Result<StreamSnapshot> {
        self.call(path.into(), Request::Describe).await
    }

    /// Snapshot every known stream path
    pub async fn list_streams(&self) -> Result<Vec<StreamSnapshot>> {
        self.call((), Request::ListStreams).await
    }

    /// Snapshot the streams matching `pattern`
    ///
    /// `*` (or an empty pattern) selects all paths; anything else selects
    /// exactly that path.
    pub async fn stream_snap(&self, pattern: &str) -> Result<Vec<StreamSnapshot>> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == WILDCARD {
            self.list_streams().await
        } else {
            Ok(vec![self.describe(pattern).await?])
        }
    }

    /// Stop a live subscriber by ID
    pub async fn stop_subscriber(&self, id: u64) -> Result<()> {
        self.call(id, Request::StopSubscriber).await
    }

    /// Stop the current run cycle with `reason`
    ///
    /// A stop that arrives while a restart is tearing down is carried over
    /// to the next cycle, which then stops immediately with that cause.
    pub fn stop(&self, reason: Error) -> bool {
        let root = self.root.read();
        if root.stop(reason.clone()) {
            return true;
        }
        if root.reason() != Some(Error::RestartRequested) || reason == Error::RestartRequested {
            return false;
        }
        let mut deferred = self.deferred.lock();
        if deferred.is_some() {
            return false;
        }
        tracing::debug!(reason = %reason, "Stop deferred past restart");
        *deferred = Some(reason);
        true
    }

    /// Shut the server down
    pub fn shutdown(&self) -> bool {
        self.stop(Error::Shutdown)
    }

    /// Discard all server state and start again
    pub fn restart(&self) -> bool {
        self.stop(Error::RestartRequested)
    }

    /// Whether the current run cycle is stopping
    pub fn is_stopping(&self) -> bool {
        self.root.read().is_stopped()
    }

    /// Whether the server is gone for good
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn root(&self) -> Lifecycle {
        self.root.read().clone()
    }

    /// Install a fresh root signal for a new run cycle
    pub(crate) fn reset_root(&self) -> Lifecycle {
        let fresh = Lifecycle::new();
        let mut root = self.root.write();
        if let Some(reason) = self.deferred.lock().take() {
            fresh.stop(reason);
        }
        *root = fresh.clone();
        fresh
    }
}
