//! MQTT feed transport for the homewatch monitoring core
//!
//! Implements [`homewatch_core::Transport`] over rumqttc's `AsyncClient`,
//! turning publishes on one broker topic into the comma-separated payloads
//! the ingestion pipeline decodes.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use homewatch_mqtt::{MqttTransport, MqttTransportConfig};
//!
//! let config = MqttTransportConfig::default()
//!     .with_host("broker.local")
//!     .with_topic("home/sensors");
//! let transport = Box::new(MqttTransport::new(config)?);
//!
//! let system = MonitorSystem::start(kv, notifier, transport).await?;
//! ```

pub mod config;
pub mod transport;

pub use config::{ConfigError, MqttTransportConfig};
pub use transport::MqttTransport;
