//! Publisher and subscriber lifecycle objects
//!
//! Plugins create these, submit them through the server handle and keep
//! their own `Arc` to drive media and observe termination. Once accepted,
//! the registry owns their placement and the event loop observes their
//! stop signals.

pub mod lifecycle;
pub mod publisher;
pub mod puller;
pub mod subscriber;
pub mod track;

pub use lifecycle::Lifecycle;
pub use publisher::Publisher;
pub use puller::Puller;
pub use subscriber::Subscriber;
pub use track::{Track, TrackKind, TrackMap};
