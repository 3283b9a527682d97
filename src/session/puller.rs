//! Relay-managed publisher

use std::sync::Arc;

use crate::registry::StreamPath;
use crate::server::config::PublishConfig;

use super::publisher::Publisher;

/// A publisher fed by pulling from an upstream source
#[derive(Debug)]
pub struct Puller {
    publisher: Arc<Publisher>,
    remote_url: String,
}

impl Puller {
    /// Create a new puller for `stream_path`, relaying from `remote_url`
    pub fn new(
        plugin: impl Into<String>,
        stream_path: impl Into<StreamPath>,
        remote_url: impl Into<String>,
        config: PublishConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            publisher: Publisher::new(plugin, stream_path, config),
            remote_url: remote_url.into(),
        })
    }

    /// The embedded publisher
    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    /// Upstream URL this puller relays from
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn stream_path(&self) -> &StreamPath {
        self.publisher.stream_path()
    }
}
