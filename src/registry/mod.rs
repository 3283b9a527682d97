//! Stream registry
//!
//! The registry is the in-memory authority on which streams exist and who is
//! attached to them. It is deliberately lock-free: exactly one owner, the
//! server's event loop, reads and writes it. Everything else talks to it
//! through requests on the loop's queue.
//!
//! # Layout
//!
//! ```text
//!                         StreamRegistry
//!     ┌──────────────────────────────────────────────────────┐
//!     │ streams: HashMap<StreamPath, StreamEntry {           │
//!     │            publisher, subscribers: IndexMap<id, _> }>│
//!     │ waiting: HashMap<StreamPath, Vec<WaitingSubscriber>> │
//!     │ pulls:   HashMap<StreamPath, Puller>                 │
//!     │ publishers / subscribers / pullers (live, by id)     │
//!     └──────────────────────────────────────────────────────┘
//!
//!   publish ──► streams[path]  ◄── waiting[path] drained on publish
//!   unpublish ──► streams[path].subscribers ──► waiting[path]
//! ```
//!
//! A registered subscriber is always in exactly one of its publisher's
//! subscriber set or the waiting queue for its path.

pub mod entry;
pub mod path;
pub mod store;

pub use entry::{StreamEntry, WaitingSubscriber};
pub use path::StreamPath;
pub use store::StreamRegistry;
