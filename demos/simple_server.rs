//! Simple in-process streaming core example
//!
//! Run with: cargo run --example simple_server [STREAM_PATH]
//!
//! Examples:
//!   cargo run --example simple_server                 # publishes live/test_key
//!   cargo run --example simple_server live/cam1       # publishes live/cam1
//!   RUST_LOG=livecore=trace cargo run --example simple_server
//!
//! The example wires a logging plugin into the server, subscribes a player
//! before any publisher exists (so it waits), then starts a synthetic
//! publisher that writes video and audio frames. A status line is printed
//! every few seconds until Ctrl-C.
//!
//! ## Features
//!
//! - Early subscribers: players that arrive first are attached when the publisher does
//! - Publisher reconnect: a dropped publisher's players wait out the grace period
//! - Ordered shutdown: publishers, then subscribers, then plugins

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use livecore::server::{Event, Plugin, ServerHandle, WILDCARD};
use livecore::{Error, PublishConfig, Publisher, Server, ServerConfig, Subscriber, Track, TrackKind};

/// Plugin that logs lifecycle events and counts them
struct LogPlugin {
    publishes: AtomicU64,
    subscribes: AtomicU64,
}

impl LogPlugin {
    fn new() -> Self {
        Self {
            publishes: AtomicU64::new(0),
            subscribes: AtomicU64::new(0),
        }
    }
}

impl Plugin for LogPlugin {
    fn name(&self) -> &str {
        "log"
    }

    fn init(&self, _server: &ServerHandle, config: Option<&serde_json::Value>) {
        println!("[log] Init, config: {:?}", config);
    }

    fn on_event(&self, event: &Event) {
        match event {
            Event::Publish(publisher) => {
                self.publishes.fetch_add(1, Ordering::Relaxed);
                println!(
                    "[log] Publish: path={} id={} plugin={}",
                    publisher.stream_path(),
                    publisher.id(),
                    publisher.plugin()
                );
            }
            Event::Pull(puller) => {
                println!(
                    "[log] Pull: path={} from {}",
                    puller.stream_path(),
                    puller.remote_url()
                );
            }
            Event::Subscribe(subscriber) => {
                self.subscribes.fetch_add(1, Ordering::Relaxed);
                println!(
                    "[log] Subscribe: path={} id={}",
                    subscriber.stream_path(),
                    subscriber.id()
                );
            }
        }
    }

    fn stop(&self, reason: &Error) {
        println!(
            "[log] Stopped ({}): publishes={} subscribes={}",
            reason,
            self.publishes.load(Ordering::Relaxed),
            self.subscribes.load(Ordering::Relaxed),
        );
    }
}

/// Write fake frames until the publisher is stopped
async fn feed(publisher: Arc<Publisher>) {
    let video = TrackKind::new("video");
    let audio = TrackKind::new("audio");
    publisher.set_track(video.clone(), Track::with_header(Bytes::from_static(b"avcC")));
    publisher.set_track(audio.clone(), Track::with_header(Bytes::from_static(b"asc")));

    let mut ticker = tokio::time::interval(Duration::from_millis(40));
    let mut timestamp = 0u32;
    loop {
        tokio::select! {
            _ = publisher.stopped() => break,
            _ = ticker.tick() => {
                publisher.write_frame(&video, timestamp);
                publisher.write_frame(&audio, timestamp);
                timestamp = timestamp.wrapping_add(40);
            }
        }
    }
    tracing::debug!(id = publisher.id(), "Feeder finished");
}

/// Print every stream every few seconds
async fn report(handle: ServerHandle) {
    let mut ticker = tokio::time::interval(Duration::from_secs(3));
    loop {
        ticker.tick().await;
        let Ok(streams) = handle.stream_snap(WILDCARD).await else {
            break;
        };
        for stream in streams {
            match &stream.publisher {
                Some(publisher) => println!(
                    "Stream {}: publisher={} tracks={:?} subscribers={:?} waiting={:?}",
                    stream.stream_path,
                    publisher.id,
                    publisher.tracks,
                    publisher.subscribers,
                    stream.waiting
                ),
                None => println!(
                    "Stream {}: no publisher, waiting={:?}",
                    stream.stream_path, stream.waiting
                ),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let stream_path = args.get(1).cloned().unwrap_or_else(|| "live/test_key".into());

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("livecore=debug".parse()?),
        )
        .init();

    let config = ServerConfig::default()
        .pulse_interval(Duration::from_secs(2))
        .publish(PublishConfig::default().publish_timeout(Duration::from_secs(5)));

    let server = Server::new(config.clone())
        .with_plugin(Arc::new(LogPlugin::new()))
        .with_plugin_config("log", serde_json::json!({ "verbose": true }));
    let handle = server.handle();

    println!("livecore v{}", livecore::server::VERSION);
    println!("Publishing on '{}', press Ctrl-C to stop", stream_path);

    let running = tokio::spawn(server.run_until(async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    // The player arrives first and waits
    let player = Subscriber::new("demo", stream_path.as_str(), config.subscribe.clone());
    player.on_close(|| println!("Player closed"));
    handle.subscribe(player.clone()).await?;

    let publisher = Publisher::new("demo", stream_path.as_str(), config.publish.clone());
    publisher.on_close(|| println!("Publisher closed"));
    handle.publish(publisher.clone()).await?;
    println!(
        "Player attached to publisher {:?}",
        player.publisher().map(|p| p.id())
    );

    tokio::spawn(feed(publisher));
    tokio::spawn(report(handle));

    running.await??;
    println!("Server stopped");
    Ok(())
}
