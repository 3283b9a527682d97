//! Stream snapshots
//!
//! Point-in-time views of registry state, built inside the event loop and
//! returned through the request bridge. They serialize to JSON so a gateway
//! can hand them out unchanged.

use serde::Serialize;

use crate::registry::StreamPath;
use crate::session::TrackKind;

/// Publisher state at the time of the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublisherSnapshot {
    /// Publisher ID
    pub id: u64,
    /// Owning plugin
    pub plugin: String,
    /// Whether the publisher was submitted with `kick_exist`
    pub kick_exist: bool,
    /// IDs of attached subscribers, in attach order
    pub subscribers: Vec<u64>,
    /// Track kinds, sorted
    pub tracks: Vec<TrackKind>,
    /// Milliseconds since the publisher was accepted
    pub uptime_ms: u64,
    /// Upstream URL when the publisher is a relay pull
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_url: Option<String>,
}

/// State of one stream path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSnapshot {
    /// Stream path
    pub stream_path: StreamPath,
    /// Active publisher, if any
    pub publisher: Option<PublisherSnapshot>,
    /// IDs of subscribers waiting for a publisher, in arrival order
    pub waiting: Vec<u64>,
}

impl StreamSnapshot {
    /// Whether the path has an active publisher
    pub fn is_active(&self) -> bool {
        self.publisher.is_some()
    }

    /// Number of subscribers attached or waiting
    pub fn subscriber_count(&self) -> usize {
        self.waiting.len()
            + self
                .publisher
                .as_ref()
                .map_or(0, |p| p.subscribers.len())
    }
}
