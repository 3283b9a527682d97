//! Error types
//!
//! A single error enum covers registry transition failures, entity stop
//! causes and server shutdown reasons. It is `Clone` because the same cause
//! is handed to every entity and plugin stopped during shutdown.

use thiserror::Error;

use crate::registry::StreamPath;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors and stop causes produced by the stream core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The stream already has a publisher (or an active pull)
    #[error("stream already exists: {0}")]
    StreamExists(StreamPath),

    /// No live subscriber with the given ID
    #[error("subscriber {0} not found")]
    NotFound(u64),

    /// Subscriber waited longer than its wait window for a publisher
    #[error("subscribe timeout")]
    SubscribeTimeout,

    /// Publisher produced no data within its liveness window
    #[error("publish timeout")]
    PublishTimeout,

    /// Publisher was replaced by a publish with `kick_exist` set
    #[error("kicked by new publisher")]
    Kicked,

    /// Server asked to discard its state and start again
    #[error("restart requested")]
    RestartRequested,

    /// Orderly server shutdown
    #[error("server shutdown")]
    Shutdown,

    /// Stopped through an administrative request
    #[error("stopped by request")]
    StoppedByRequest,

    /// Stopped with an arbitrary cause
    #[error("stopped: {0}")]
    Stopped(String),

    /// The event loop is gone and can no longer answer requests
    #[error("server closed")]
    ServerClosed,
}

impl Error {
    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::StreamExists(_) => "stream_exists",
            Error::NotFound(_) => "not_found",
            Error::SubscribeTimeout => "subscribe_timeout",
            Error::PublishTimeout => "publish_timeout",
            Error::Kicked => "kicked",
            Error::RestartRequested => "restart_requested",
            Error::Shutdown => "shutdown",
            Error::StoppedByRequest => "stopped_by_request",
            Error::Stopped(_) => "stopped",
            Error::ServerClosed => "server_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::StreamExists(StreamPath::new("live/cam1"));
        assert_eq!(err.to_string(), "stream already exists: live/cam1");
        assert_eq!(Error::NotFound(7).to_string(), "subscriber 7 not found");
    }

    #[test]
    fn test_labels() {
        assert_eq!(Error::Kicked.as_label(), "kicked");
        assert_eq!(Error::Stopped("eof".into()).as_label(), "stopped");
    }
}
