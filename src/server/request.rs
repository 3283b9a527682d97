//! Requests accepted by the event loop

use std::sync::Arc;

use crate::error::Error;
use crate::promise::Promise;
use crate::registry::StreamPath;
use crate::session::{Publisher, Puller, Subscriber};
use crate::stats::StreamSnapshot;

/// A request on the event loop's queue
#[derive(Debug)]
pub enum Request {
    /// Register a publisher; fails with `StreamExists`
    Publish(Promise<Arc<Publisher>>),
    /// Register a subscriber; always accepted, deferred if no publisher
    Subscribe(Promise<Arc<Subscriber>>),
    /// Register a relay pull; fails with `StreamExists`
    Pull(Promise<Arc<Puller>>),
    /// Look up the active publisher of one path
    Snapshot(Promise<StreamPath, Option<Arc<Publisher>>>),
    /// Read the state of one path
    Describe(Promise<StreamPath, StreamSnapshot>),
    /// Read the state of every known path
    ListStreams(Promise<(), Vec<StreamSnapshot>>),
    /// Stop a live subscriber by ID; fails with `NotFound`
    StopSubscriber(Promise<u64>),
}

impl Request {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Publish(_) => "publish",
            Request::Subscribe(_) => "subscribe",
            Request::Pull(_) => "pull",
            Request::Snapshot(_) => "snapshot",
            Request::Describe(_) => "describe",
            Request::ListStreams(_) => "list_streams",
            Request::StopSubscriber(_) => "stop_subscriber",
        }
    }

    /// Whether the caller stopped waiting for the outcome
    pub fn is_abandoned(&self) -> bool {
        match self {
            Request::Publish(p) => p.is_abandoned(),
            Request::Subscribe(p) => p.is_abandoned(),
            Request::Pull(p) => p.is_abandoned(),
            Request::Snapshot(p) => p.is_abandoned(),
            Request::Describe(p) => p.is_abandoned(),
            Request::ListStreams(p) => p.is_abandoned(),
            Request::StopSubscriber(p) => p.is_abandoned(),
        }
    }

    /// Complete the request with an error without handling it
    pub fn fail(self, err: Error) {
        match self {
            Request::Publish(p) => {
                p.reject(err);
            }
            Request::Subscribe(p) => {
                p.reject(err);
            }
            Request::Pull(p) => {
                p.reject(err);
            }
            Request::Snapshot(p) => {
                p.reject(err);
            }
            Request::Describe(p) => {
                p.reject(err);
            }
            Request::ListStreams(p) => {
                p.reject(err);
            }
            Request::StopSubscriber(p) => {
                p.reject(err);
            }
        }
    }
}
