//! Publisher lifecycle object
//!
//! A `Publisher` is created by a plugin when a source starts producing a
//! stream, submitted to the server, and from then on registered and stopped
//! by the event loop. The plugin keeps its own `Arc` to feed tracks and to
//! learn when (and why) it was stopped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::registry::StreamPath;
use crate::server::config::PublishConfig;

use super::lifecycle::Lifecycle;
use super::track::{Track, TrackKind, TrackMap};

pub(crate) type Closer = Box<dyn FnOnce() + Send>;

/// Active source of a stream
pub struct Publisher {
    /// Registry-assigned ID (0 until registered)
    id: AtomicU64,

    /// Stream this publisher produces
    stream_path: StreamPath,

    /// Name of the owning plugin
    plugin: String,

    /// Publish options
    config: PublishConfig,

    /// Stop signal
    lifecycle: Lifecycle,

    /// Track state, handed over on succession
    tracks: Mutex<TrackMap>,

    /// Last time data was written; drives the liveness check
    last_active: Mutex<Instant>,

    /// When the registry accepted this publisher
    started_at: Mutex<Option<Instant>>,

    /// Resource release hook, run once on unpublish
    closer: Mutex<Option<Closer>>,
}

impl Publisher {
    /// Create a new, unregistered publisher
    pub fn new(
        plugin: impl Into<String>,
        stream_path: impl Into<StreamPath>,
        config: PublishConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: AtomicU64::new(0),
            stream_path: stream_path.into(),
            plugin: plugin.into(),
            config,
            lifecycle: Lifecycle::new(),
            tracks: Mutex::new(TrackMap::new()),
            last_active: Mutex::new(Instant::now()),
            started_at: Mutex::new(None),
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

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn kick_exist(&self) -> bool {
        self.config.kick_exist
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Stop this publisher; the event loop unpublishes it
    pub fn stop(&self, reason: Error) -> bool {
        self.lifecycle.stop(reason)
    }

    pub fn is_stopped(&self) -> bool {
        self.lifecycle.is_stopped()
    }

    pub fn stop_reason(&self) -> Option<Error> {
        self.lifecycle.reason()
    }

    /// Wait until this publisher is stopped
    pub async fn stopped(&self) {
        self.lifecycle.stopped().await
    }

    /// Mark the publisher as alive (call on every written frame)
    pub fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    /// Time since the registry accepted this publisher
    pub fn uptime(&self) -> Option<std::time::Duration> {
        self.started_at.lock().map(|t| t.elapsed())
    }

    /// Set or replace a track
    pub fn set_track(&self, kind: TrackKind, track: Track) {
        self.tracks.lock().insert(kind, track);
    }

    /// Record a frame on a track, creating it if needed
    pub fn write_frame(&self, kind: &TrackKind, timestamp: u32) {
        self.tracks
            .lock()
            .entry(kind.clone())
            .or_default()
            .on_frame(timestamp);
        self.touch();
    }

    /// Get a copy of a track
    pub fn track(&self, kind: &TrackKind) -> Option<Track> {
        self.tracks.lock().get(kind).cloned()
    }

    /// Kinds of all tracks, sorted
    pub fn track_kinds(&self) -> Vec<TrackKind> {
        let mut kinds: Vec<TrackKind> = self.tracks.lock().keys().cloned().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Register a hook that releases the publisher's resources on unpublish
    pub fn on_close(&self, closer: impl FnOnce() + Send + 'static) {
        *self.closer.lock() = Some(Box::new(closer));
    }

    /// Assign the registry ID and start the liveness timer
    pub(crate) fn activate(&self, id: u64, now: Instant) {
        self.id.store(id, Ordering::Release);
        *self.last_active.lock() = now;
        *self.started_at.lock() = Some(now);
    }

    /// Liveness check run on every pulse
    pub(crate) fn check_timeout(&self, now: Instant) -> Result<()> {
        let timeout = self.config.publish_timeout;
        if timeout.is_zero() {
            return Ok(());
        }
        if now.saturating_duration_since(*self.last_active.lock()) > timeout {
            return Err(Error::PublishTimeout);
        }
        Ok(())
    }

    /// Take the accumulated track state of a previous publisher
    ///
    /// Tracks this publisher already set win over inherited ones.
    pub(crate) fn take_over(&self, previous: &Publisher) {
        let inherited = std::mem::take(&mut *previous.tracks.lock());
        let mut tracks = self.tracks.lock();
        for (kind, track) in inherited {
            tracks.entry(kind).or_insert(track);
        }
    }

    /// Run the close hook, if any
    pub(crate) fn close(&self) {
        let closer = self.closer.lock().take();
        if let Some(closer) = closer {
            closer();
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("id", &self.id())
            .field("stream_path", &self.stream_path)
            .field("plugin", &self.plugin)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_new_publisher_is_unregistered() {
        let publisher = Publisher::new("test", "/live/cam1", PublishConfig::default());

        assert_eq!(publisher.id(), 0);
        assert_eq!(publisher.stream_path().as_str(), "live/cam1");
        assert_eq!(publisher.plugin(), "test");
        assert!(publisher.uptime().is_none());
        assert!(!publisher.is_stopped());
    }

    #[test]
    fn test_check_timeout() {
        let config = PublishConfig::default().publish_timeout(Duration::from_secs(2));
        let publisher = Publisher::new("test", "live/cam1", config);
        let now = Instant::now();
        publisher.activate(1, now);

        assert!(publisher.check_timeout(now + Duration::from_secs(1)).is_ok());
        assert_eq!(
            publisher.check_timeout(now + Duration::from_secs(3)),
            Err(Error::PublishTimeout)
        );
    }

    #[test]
    fn test_zero_timeout_disables_check() {
        let config = PublishConfig::default().publish_timeout(Duration::ZERO);
        let publisher = Publisher::new("test", "live/cam1", config);
        let now = Instant::now();
        publisher.activate(1, now);

        assert!(publisher.check_timeout(now + Duration::from_secs(3600)).is_ok());
    }

    #[test]
    fn test_take_over_moves_tracks() {
        let video = TrackKind::new("h264");
        let audio = TrackKind::new("aac");

        let old = Publisher::new("test", "live/cam1", PublishConfig::default());
        old.set_track(video.clone(), Track::with_header(Bytes::from_static(&[1])));
        old.set_track(audio.clone(), Track::with_header(Bytes::from_static(&[2])));

        let new = Publisher::new("test", "live/cam1", PublishConfig::default());
        new.set_track(audio.clone(), Track::with_header(Bytes::from_static(&[3])));
        new.take_over(&old);

        assert!(old.track_kinds().is_empty());
        assert_eq!(new.track_kinds(), vec![audio.clone(), video.clone()]);
        assert_eq!(
            new.track(&audio).unwrap().sequence_header,
            Some(Bytes::from_static(&[3]))
        );
    }

    #[test]
    fn test_close_runs_once() {
        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();
        let publisher = Publisher::new("test", "live/cam1", PublishConfig::default());
        publisher.on_close(move || flag.store(true, Ordering::SeqCst));

        publisher.close();
        publisher.close();

        assert!(closed.load(Ordering::SeqCst));
    }
}
