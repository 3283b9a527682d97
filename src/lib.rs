//! # livecore
//!
//! Runtime core of a live media-streaming server: a stream registry owned by
//! a single event-arbitration loop, a one-shot request bridge for mutating it
//! from any task, and a termination multiplexer that notices when publishers
//! and subscribers go away.
//!
//! Protocol plugins create [`Publisher`]s and [`Subscriber`]s and submit them
//! through a [`ServerHandle`]; the loop decides where they go.
//!
//! ```no_run
//! use livecore::{Publisher, Server, ServerConfig, Subscriber};
//!
//! # async fn example() -> livecore::Result<()> {
//! let config = ServerConfig::default();
//! let server = Server::new(config.clone());
//! let handle = server.handle();
//! let running = tokio::spawn(server.run());
//!
//! // A player asks for the stream before the encoder connects: it waits.
//! let player = Subscriber::new("rtmp", "live/cam1", config.subscribe.clone());
//! handle.subscribe(player.clone()).await?;
//!
//! // The encoder connects; the player is attached.
//! let encoder = Publisher::new("rtmp", "live/cam1", config.publish.clone());
//! handle.publish(encoder).await?;
//!
//! handle.shutdown();
//! running.await.expect("server task panicked")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod promise;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use promise::{Completion, Promise};
pub use registry::{StreamPath, StreamRegistry};
pub use server::{
    Event, Plugin, PublishConfig, Server, ServerConfig, ServerHandle, SubscribeConfig,
};
pub use session::{Lifecycle, Publisher, Puller, Subscriber, Track, TrackKind};
pub use stats::{PublisherSnapshot, StreamSnapshot};
