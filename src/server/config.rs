//! Server configuration

use std::time::Duration;

use serde::Deserialize;

/// Publish options, carried by each publisher
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Replace an existing publisher on the same path instead of failing
    pub kick_exist: bool,

    /// Stop the publisher if it produces nothing for this long (zero disables)
    #[serde(with = "duration_ms", rename = "publish_timeout_ms")]
    pub publish_timeout: Duration,

    /// How long subscribers wait for a republish after this publisher leaves
    #[serde(with = "duration_ms", rename = "wait_close_timeout_ms")]
    pub wait_close_timeout: Duration,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            kick_exist: false,
            publish_timeout: Duration::from_secs(10),
            wait_close_timeout: Duration::from_secs(10),
        }
    }
}

impl PublishConfig {
    /// Allow kicking an existing publisher
    pub fn kick_exist(mut self, kick: bool) -> Self {
        self.kick_exist = kick;
        self
    }

    /// Set the liveness timeout
    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Set the republish grace window
    pub fn wait_close_timeout(mut self, timeout: Duration) -> Self {
        self.wait_close_timeout = timeout;
        self
    }
}

/// Subscribe options, carried by each subscriber
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubscribeConfig {
    /// How long a subscriber may wait for a publisher to appear
    #[serde(with = "duration_ms", rename = "wait_timeout_ms")]
    pub wait_timeout: Duration,
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
        }
    }
}

impl SubscribeConfig {
    /// Set the wait timeout
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}

/// Server configuration options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interval of the timeout sweep
    #[serde(with = "duration_ms", rename = "pulse_interval_ms")]
    pub pulse_interval: Duration,

    /// Capacity of the request queue; a full queue stalls callers
    pub event_queue_capacity: usize,

    /// Dispatch subscribe events to plugins
    pub enable_sub_event: bool,

    /// Default publish options for plugins that don't bring their own
    pub publish: PublishConfig,

    /// Default subscribe options for plugins that don't bring their own
    pub subscribe: SubscribeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pulse_interval: Duration::from_secs(5),
            event_queue_capacity: 10,
            enable_sub_event: true,
            publish: PublishConfig::default(),
            subscribe: SubscribeConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Set the pulse interval
    pub fn pulse_interval(mut self, interval: Duration) -> Self {
        self.pulse_interval = interval;
        self
    }

    /// Set the request queue capacity (at least 1)
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }

    /// Enable or disable subscribe event dispatch
    pub fn enable_sub_event(mut self, enable: bool) -> Self {
        self.enable_sub_event = enable;
        self
    }

    /// Set default publish options
    pub fn publish(mut self, publish: PublishConfig) -> Self {
        self.publish = publish;
        self
    }

    /// Set default subscribe options
    pub fn subscribe(mut self, subscribe: SubscribeConfig) -> Self {
        self.subscribe = subscribe;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.pulse_interval, Duration::from_secs(5));
        assert_eq!(config.event_queue_capacity, 10);
        assert!(config.enable_sub_event);
        assert!(!config.publish.kick_exist);
        assert_eq!(config.publish.publish_timeout, Duration::from_secs(10));
        assert_eq!(config.subscribe.wait_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_chaining() {
        let config = ServerConfig::default()
            .pulse_interval(Duration::from_millis(100))
            .event_queue_capacity(0)
            .enable_sub_event(false)
            .publish(PublishConfig::default().kick_exist(true))
            .subscribe(SubscribeConfig::default().wait_timeout(Duration::from_secs(1)));

        assert_eq!(config.pulse_interval, Duration::from_millis(100));
        assert_eq!(config.event_queue_capacity, 1);
        assert!(!config.enable_sub_event);
        assert!(config.publish.kick_exist);
        assert_eq!(config.subscribe.wait_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "pulse_interval_ms": 250,
            "publish": { "kick_exist": true, "wait_close_timeout_ms": 3000 }
        }))
        .unwrap();

        assert_eq!(config.pulse_interval, Duration::from_millis(250));
        assert!(config.publish.kick_exist);
        assert_eq!(config.publish.wait_close_timeout, Duration::from_secs(3));
        assert_eq!(config.publish.publish_timeout, Duration::from_secs(10));
        assert_eq!(config.event_queue_capacity, 10);
    }
}
