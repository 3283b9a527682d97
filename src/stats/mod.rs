//! Stream state snapshots

pub mod snapshot;

pub use snapshot::{PublisherSnapshot, StreamSnapshot};
