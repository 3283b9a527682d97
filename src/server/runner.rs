//! Server run cycle
//!
//! Owns the configuration, the plugin list and the receiving end of the
//! request queue, and drives the event loop through run cycles:
//!
//! ```text
//!   run() ──► init plugins ──► event loop ──► stop publishers
//!    ▲                                        stop subscribers
//!    │                                        stop plugins
//!    └── RestartRequested: reset state ◄──────────┘
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::config::ServerConfig;
use super::event_loop::EventLoop;
use super::handle::ServerHandle;
use super::plugin::Plugin;
use super::request::Request;

/// Crate version, logged at start
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Live streaming server core
pub struct Server {
    config: ServerConfig,
    plugins: Vec<Arc<dyn Plugin>>,
    plugin_configs: HashMap<String, serde_json::Value>,
    handle: ServerHandle,
    rx: mpsc::Receiver<Request>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.event_queue_capacity.max(1));
        Self {
            config,
            plugins: Vec::new(),
            plugin_configs: HashMap::new(),
            handle: ServerHandle::new(tx),
            rx,
        }
    }

    /// Register a plugin; events are dispatched in registration order
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.add_plugin(plugin);
        self
    }

    /// Register a plugin
    pub fn add_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        tracing::debug!(plugin = plugin.name(), "Plugin registered");
        self.plugins.push(plugin);
    }

    /// Set the configuration fragment handed to the plugin called `name`
    pub fn with_plugin_config(mut self, name: impl Into<String>, config: serde_json::Value) -> Self {
        self.plugin_configs.insert(name.into(), config);
        self
    }

    /// Handle for issuing requests; valid across restarts
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server
    ///
    /// Returns `Ok(())` after [`ServerHandle::shutdown`], or the stop cause
    /// passed to [`ServerHandle::stop`]. A restart request resets all state
    /// and runs again without returning.
    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.run_cycle().await {
                Error::RestartRequested => self.reset(),
                Error::Shutdown => return Ok(()),
                reason => return Err(reason),
            }
        }
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let handle = self.handle();
        let run = self.run();
        tokio::pin!(run);
        tokio::pin!(shutdown);

        tokio::select! {
            result = &mut run => result,
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                handle.shutdown();
                run.await
            }
        }
    }

    async fn run_cycle(&mut self) -> Error {
        let root = self.handle.root();
        tracing::info!(version = VERSION, plugins = self.plugins.len(), "Server starting");

        for plugin in &self.plugins {
            plugin.init(&self.handle, self.plugin_configs.get(plugin.name()));
        }

        let mut event_loop = EventLoop::new(&self.config, &self.plugins);
        event_loop.run(&root, &mut self.rx).await;

        let reason = root.reason().unwrap_or(Error::ServerClosed);
        tracing::warn!(reason = %reason, "Server is done");

        event_loop.stop_entities(&reason);
        for plugin in &self.plugins {
            plugin.stop(&reason);
        }

        reason
    }

    /// Discard run-cycle state before a restart
    ///
    /// Requests still queued from the previous cycle fail with
    /// `RestartRequested`; the registry is rebuilt by the next cycle.
    fn reset(&mut self) {
        self.handle.reset_root();
        let mut dropped = 0;
        while let Ok(request) = self.rx.try_recv() {
            request.fail(Error::RestartRequested);
            dropped += 1;
        }
        tracing::info!(dropped_requests = dropped, "Server restarting");
    }
}
