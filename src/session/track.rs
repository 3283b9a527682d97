//! Per-publisher track state
//!
//! A publisher keeps one `Track` per (possibly transcoded) track kind. The
//! cached sequence header lets a succeeding publisher, and the subscribers
//! it inherits, carry on without waiting for the next decoder config.

use std::collections::HashMap;

use bytes::Bytes;
use serde::Serialize;

/// Name of a track kind, e.g. `h264` or `aac`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TrackKind(String);

impl TrackKind {
    /// Create a new track kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Borrow as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of one track
#[derive(Debug, Clone, Default)]
pub struct Track {
    /// Decoder configuration (SPS/PPS, AudioSpecificConfig, ...)
    pub sequence_header: Option<Bytes>,

    /// Timestamp of the last frame written, in milliseconds
    pub last_timestamp: u32,

    /// Frames written to this track
    pub frames: u64,
}

impl Track {
    /// Create an empty track
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a track with a known sequence header
    pub fn with_header(header: Bytes) -> Self {
        Self {
            sequence_header: Some(header),
            ..Self::default()
        }
    }

    /// Record a frame
    pub fn on_frame(&mut self, timestamp: u32) {
        self.last_timestamp = timestamp;
        self.frames += 1;
    }
}

/// Track state of a publisher, keyed by kind
pub type TrackMap = HashMap<TrackKind, Track>;
