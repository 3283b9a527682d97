//! Subscriber lifecycle object

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::registry::StreamPath;
use crate::server::config::SubscribeConfig;

use super::lifecycle::Lifecycle;
use super::publisher::{Closer, Publisher};

/// Consumer of a stream
///
/// Holds a lookup-only reference to the publisher it is (or was last)
/// attached to. After an unpublish the reference is kept while the
/// subscriber waits, so a republishing source can inherit its track state.
pub struct Subscriber {
    id: AtomicU64,
    stream_path: StreamPath,
    plugin: String,
    config: SubscribeConfig,
    lifecycle: Lifecycle,
    publisher: Mutex<Option<Arc<Publisher>>>,
    closer: Mutex<Option<Closer>>,
}

impl Subscriber {
    /// Create a new, unregistered subscriber
    pub fn new(
        plugin: impl Into<String>,
        stream_path: impl Into<StreamPath>,
        config: SubscribeConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: AtomicU64::new(0),
            stream_path: stream_path.into(),
            plugin: plugin.into(),
            config,
            lifecycle: Lifecycle::new(),
            publisher: Mutex::new(None),
            closer: Mutex::new(None),
        })
    }

    /// Registry-assigned ID, 0 while unregistered
    pub fn id(&self) -> u64 {
        self.id.load(Ordering::Acquire)
    }

    pub fn stream_path(&self) -> &StreamPath {
        &self.stream_path
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn config(&self) -> &SubscribeConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Publisher this subscriber is attached to, or last was
    pub fn publisher(&self) -> Option<Arc<Publisher>> {
        self.publisher.lock().clone()
    }

    /// Stop this subscriber; the event loop unsubscribes it
    pub fn stop(&self, reason: Error) -> bool {
        self.lifecycle.stop(reason)
    }

    pub fn is_stopped(&self) -> bool {
        self.lifecycle.is_stopped()
    }

    pub fn stop_reason(&self) -> Option<Error> {
        self.lifecycle.reason()
    }

    /// Wait until this subscriber is stopped
    pub async fn stopped(&self) {
        self.lifecycle.stopped().await
    }

    /// Register a hook that releases the subscriber's resources on unsubscribe
    pub fn on_close(&self, closer: impl FnOnce() + Send + 'static) {
        *self.closer.lock() = Some(Box::new(closer));
    }

    pub(crate) fn assign_id(&self, id: u64) {
        self.id.store(id, Ordering::Release);
    }

    pub(crate) fn set_publisher(&self, publisher: Option<Arc<Publisher>>) {
        *self.publisher.lock() = publisher;
    }

    pub(crate) fn close(&self) {
        let closer = self.closer.lock().take();
        if let Some(closer) = closer {
            closer();
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id())
            .field("stream_path", &self.stream_path)
            .field("plugin", &self.plugin)
            .field("publisher", &self.publisher.lock().as_ref().map(|p| p.id()))
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
