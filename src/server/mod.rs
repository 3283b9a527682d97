//! Server: event loop, request bridge and plugin host
//!
//! ```text
//!   plugins / gateway                         event loop task
//!   ─────────────────                         ───────────────
//!   ServerHandle::publish ──┐
//!   ServerHandle::subscribe ├─► mpsc queue ──► EventLoop ──► StreamRegistry
//!   ServerHandle::pull ─────┘   (bounded)        │  ▲
//!                                                │  └── Terminations (stop signals)
//!                                                └────► Plugin::on_event
//! ```

pub mod config;
pub mod event_loop;
pub mod handle;
pub mod plugin;
pub mod request;
pub mod runner;
pub mod terminations;

pub use config::{PublishConfig, ServerConfig, SubscribeConfig};
pub use handle::{ServerHandle, WILDCARD};
pub use plugin::{Event, Plugin};
pub use request::Request;
pub use runner::{Server, VERSION};
