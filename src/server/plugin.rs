//! Plugin trait and lifecycle events
//!
//! Plugins are the collaborators that bring media in and out of the server
//! (protocol sources and sinks, relays, recorders). The core only needs to
//! initialise them, tell them about accepted publishers and subscribers, and
//! stop them.

use std::sync::Arc;

use crate::error::Error;
use crate::session::{Publisher, Puller, Subscriber};

use super::handle::ServerHandle;

/// Lifecycle event dispatched to plugins
#[derive(Debug, Clone)]
pub enum Event {
    /// A publisher was accepted
    Publish(Arc<Publisher>),
    /// A relay pull was accepted
    Pull(Arc<Puller>),
    /// A subscriber was accepted (attached or waiting)
    Subscribe(Arc<Subscriber>),
}

impl Event {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Publish(_) => "publish",
            Event::Pull(_) => "pull",
            Event::Subscribe(_) => "subscribe",
        }
    }
}

/// A server plugin
///
/// `on_event` runs on the event loop. It must return quickly and must not
/// await requests on the server handle; spawn a task for anything that does.
pub trait Plugin: Send + Sync + 'static {
    /// Plugin name; also the key of its configuration fragment
    fn name(&self) -> &str;

    /// Called at the start of every server run cycle
    fn init(&self, server: &ServerHandle, config: Option<&serde_json::Value>) {
        let _ = (server, config);
    }

    /// Called for every accepted publish, pull and subscribe
    fn on_event(&self, event: &Event) {
        let _ = event;
    }

    /// Called when the server stops, after all publishers and subscribers
    fn stop(&self, reason: &Error) {
        let _ = reason;
    }

    /// Disabled plugins keep their place but receive no events
    fn disabled(&self) -> bool {
        false
    }
}
