//! The abstract feed transport consumed by the ingestion pipeline.
//!
//! The monitoring core does not care whether messages arrive over MQTT, a
//! websocket or a replay file; it consumes whatever implements
//! [`Transport`]. The `homewatch-mqtt` crate provides the production
//! implementation.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Errors from a feed transport.
///
/// `Clone` because failures are published on a [`observer_bus::Subject`]
/// for any number of collaborators to observe.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connecting to the feed failed
    #[error("failed to connect to the event feed: {0}")]
    Connect(String),

    /// Subscribing to the feed topic failed
    #[error("failed to subscribe to the feed topic: {0}")]
    Subscribe(String),

    /// An established connection was lost
    #[error("connection to the event feed lost: {0}")]
    ConnectionLost(String),

    /// Graceful disconnect failed
    #[error("failed to disconnect from the event feed: {0}")]
    Disconnect(String),
}

/// One item from the transport's receive channel.
#[derive(Debug, Clone)]
pub enum TransportMessage {
    /// A raw feed payload (comma-separated text)
    Payload(String),
    /// The transport failed; no further payloads will follow
    Failure(TransportError),
}

/// A connection to the single-topic sensor feed.
///
/// `connect` hands back the receiving end of a channel; the transport owns
/// whatever background task feeds it. Dropping the receiver (or a failure
/// inside the transport) ends the stream; reconnection policy is a
/// collaborator concern, not part of this core.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection and subscribe to the feed topic.
    async fn connect(&mut self) -> Result<mpsc::Receiver<TransportMessage>, TransportError>;

    /// Close the connection gracefully.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
