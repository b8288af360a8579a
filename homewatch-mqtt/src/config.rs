//! Broker connection configuration.

use std::time::Duration;

/// Configuration error for [`MqttTransportConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("broker host must not be empty")]
    EmptyHost,

    #[error("broker port must not be zero")]
    ZeroPort,

    #[error("feed topic must not be empty")]
    EmptyTopic,

    #[error("client id must not be empty")]
    EmptyClientId,

    #[error("channel capacity must be at least 1")]
    ZeroCapacity,
}

/// Connection settings for the sensor feed broker.
///
/// # Example
///
/// ```rust,ignore
/// let config = MqttTransportConfig::default()
///     .with_host("broker.local")
///     .with_topic("home/sensors");
/// let transport = MqttTransport::new(config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttTransportConfig {
    /// Broker hostname or IP address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// The single topic carrying sensor payloads
    pub topic: String,
    /// Client identifier presented to the broker
    pub client_id: String,
    /// MQTT keep-alive interval
    pub keep_alive: Duration,
    /// Capacity of the client request queue and the payload channel
    pub capacity: usize,
}

impl Default for MqttTransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "homewatch/events".to_string(),
            client_id: "homewatch".to_string(),
            keep_alive: Duration::from_secs(30),
            capacity: 16,
        }
    }
}

impl MqttTransportConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Reject configurations the broker or the client library would choke
    /// on later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
