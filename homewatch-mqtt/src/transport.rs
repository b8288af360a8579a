//! The production [`Transport`] over rumqttc.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use homewatch_core::{Transport, TransportError, TransportMessage};

use crate::config::{ConfigError, MqttTransportConfig};

/// MQTT implementation of the sensor feed transport.
///
/// Subscribes to the single configured topic at QoS 0 (the feed assumes
/// at-most-once delivery) and forwards every publish as a
/// [`TransportMessage::Payload`]. A broker session drop surfaces as one
/// [`TransportMessage::Failure`] and ends the stream; reconnecting means
/// calling [`Transport::connect`] on a fresh transport.
pub struct MqttTransport {
    config: MqttTransportConfig,
    client: Option<AsyncClient>,
    worker: Option<JoinHandle<()>>,
    closing: Arc<AtomicBool>,
}

impl MqttTransport {
    /// Build a transport from a validated configuration.
    pub fn new(config: MqttTransportConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            client: None,
            worker: None,
            closing: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &MqttTransportConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<TransportMessage>, TransportError> {
        if self.client.is_some() {
            return Err(TransportError::Connect("already connected".to_string()));
        }

        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(self.config.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(options, self.config.capacity);
        client
            .subscribe(&self.config.topic, QoS::AtMostOnce)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        let (tx, rx) = mpsc::channel(self.config.capacity);
        let topic = self.config.topic.clone();
        let resubscribe_client = client.clone();
        let closing = Arc::clone(&self.closing);

        let worker = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                        if tx.send(TransportMessage::Payload(payload)).await.is_err() {
                            // Receiver dropped, nobody is listening anymore.
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!(topic = %topic, "broker session established");
                        // The broker may have dropped our subscriptions
                        // between sessions.
                        if let Err(e) = resubscribe_client.subscribe(&topic, QoS::AtMostOnce).await
                        {
                            tracing::error!(topic = %topic, "re-subscribe failed: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if closing.load(Ordering::SeqCst) {
                            break;
                        }
                        tracing::warn!("mqtt poll error: {e}");
                        let _ = tx
                            .send(TransportMessage::Failure(TransportError::ConnectionLost(
                                e.to_string(),
                            )))
                            .await;
                        break;
                    }
                }
            }
        });

        self.client = Some(client);
        self.worker = Some(worker);
        Ok(rx)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        // The event loop erroring out after this point is expected, not a
        // connection failure to report.
        self.closing.store(true, Ordering::SeqCst);
        let result = client
            .disconnect()
            .await
            .map_err(|e| TransportError::Disconnect(e.to_string()));

        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        result
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("config", &self.config)
            .field("connected", &self.client.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = MqttTransportConfig::default().with_topic("");
        assert!(MqttTransport::new(config).is_err());
    }

    #[test]
    fn test_new_starts_disconnected() {
        let transport = MqttTransport::new(MqttTransportConfig::default()).unwrap();
        assert!(transport.client.is_none());
        assert!(transport.worker.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_a_no_op() {
        let mut transport = MqttTransport::new(MqttTransportConfig::default()).unwrap();
        assert!(transport.disconnect().await.is_ok());
    }
}
