//! Feed ingestion: decode, persist, fan out.
//!
//! The pipeline owns the connection lifecycle over an abstract
//! [`Transport`] and turns each raw payload into a decoded, persisted and
//! published [`SensorEvent`]. Persistence happens before fan-out, so by
//! the time any observer sees an event the store already reflects it.

use std::sync::Arc;

use observer_bus::Subject;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use homewatch_store::{EventStore, SensorEvent};

use crate::error::Result;
use crate::transport::{Transport, TransportError, TransportMessage};

/// Lifecycle of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Connects the transport to the store and the message subject.
///
/// Failures after startup never propagate: decode problems degrade to
/// sentinel fields, storage write errors are logged, and a transport
/// failure flips the status to `Disconnected` and goes out on the failure
/// subject. Reconnecting is the caller's decision.
pub struct IngestionPipeline {
    transport: Mutex<Box<dyn Transport>>,
    status: Arc<RwLock<ConnectionStatus>>,
    messages: Arc<Subject<SensorEvent>>,
    failures: Arc<Subject<TransportError>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IngestionPipeline {
    /// Initialize storage, connect the transport and start the ingestion
    /// worker.
    ///
    /// The subjects are injected rather than owned so that monitors can
    /// attach to them before the first message flows.
    pub async fn start(
        store: Arc<EventStore>,
        mut transport: Box<dyn Transport>,
        messages: Arc<Subject<SensorEvent>>,
        failures: Arc<Subject<TransportError>>,
    ) -> Result<Self> {
        let status = Arc::new(RwLock::new(ConnectionStatus::Connecting));

        // The store must be usable before the first payload can arrive.
        store.initialize().await?;

        let receiver = match transport.connect().await {
            Ok(receiver) => receiver,
            Err(error) => {
                *status.write() = ConnectionStatus::Disconnected;
                return Err(error.into());
            }
        };
        *status.write() = ConnectionStatus::Connected;

        let worker = tokio::spawn(Self::run(
            receiver,
            store,
            Arc::clone(&status),
            Arc::clone(&messages),
            Arc::clone(&failures),
        ));

        Ok(Self {
            transport: Mutex::new(transport),
            status,
            messages,
            failures,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// The current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// The subject every decoded event is published on.
    pub fn messages(&self) -> &Arc<Subject<SensorEvent>> {
        &self.messages
    }

    /// The subject transport failures are published on.
    pub fn failures(&self) -> &Arc<Subject<TransportError>> {
        &self.failures
    }

    /// Disconnect the transport and stop the worker.
    pub async fn shutdown(&self) -> Result<()> {
        *self.status.write() = ConnectionStatus::Disconnecting;
        let result = self.transport.lock().await.disconnect().await;
        *self.status.write() = ConnectionStatus::Disconnected;

        if let Some(worker) = self.worker.lock().await.take() {
            // Disconnecting closes the transport channel, which ends the
            // worker loop.
            if let Err(error) = worker.await {
                tracing::warn!(%error, "ingestion worker did not stop cleanly");
            }
        }
        result.map_err(Into::into)
    }

    async fn run(
        mut receiver: tokio::sync::mpsc::Receiver<TransportMessage>,
        store: Arc<EventStore>,
        status: Arc<RwLock<ConnectionStatus>>,
        messages: Arc<Subject<SensorEvent>>,
        failures: Arc<Subject<TransportError>>,
    ) {
        while let Some(message) = receiver.recv().await {
            match message {
                TransportMessage::Payload(raw) => {
                    Self::ingest(&raw, &store, &messages).await;
                }
                TransportMessage::Failure(error) => {
                    tracing::warn!(%error, "transport failed");
                    *status.write() = ConnectionStatus::Disconnected;
                    failures.notify(&error);
                    break;
                }
            }
        }

        // Channel closed without an explicit failure (transport dropped or
        // graceful disconnect).
        let mut status = status.write();
        if *status == ConnectionStatus::Connected {
            *status = ConnectionStatus::Disconnected;
        }
    }

    async fn ingest(raw: &str, store: &EventStore, messages: &Subject<SensorEvent>) {
        let event = SensorEvent::from_transport(raw);
        tracing::debug!(location = %event.location, "ingesting event");

        if let Err(error) = store.append(&event).await {
            tracing::warn!(%error, "failed to persist event, publishing anyway");
        }
        if event.motion_detected {
            if let Err(error) = store.set_last_motion_event(&event).await {
                tracing::warn!(%error, "failed to persist last motion event");
            }
        }

        messages.notify(&event);
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use homewatch_store::{Location, MemoryStore};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    /// A transport fed by the test through an mpsc sender.
    struct ScriptedTransport {
        feed: StdMutex<Option<mpsc::Receiver<TransportMessage>>>,
        fail_connect: bool,
        disconnected: Arc<std::sync::atomic::AtomicBool>,
    }

    impl ScriptedTransport {
        fn new() -> (Box<Self>, mpsc::Sender<TransportMessage>) {
            let (tx, rx) = mpsc::channel(16);
            (
                Box::new(Self {
                    feed: StdMutex::new(Some(rx)),
                    fail_connect: false,
                    disconnected: Arc::new(std::sync::atomic::AtomicBool::new(false)),
                }),
                tx,
            )
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn connect(&mut self) -> std::result::Result<mpsc::Receiver<TransportMessage>, TransportError> {
            if self.fail_connect {
                return Err(TransportError::Connect("scripted refusal".to_string()));
            }
            self.feed
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| TransportError::Connect("already connected".to_string()))
        }

        async fn disconnect(&mut self) -> std::result::Result<(), TransportError> {
            self.disconnected
                .store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        pipeline: IngestionPipeline,
        feed: mpsc::Sender<TransportMessage>,
        store: Arc<EventStore>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(EventStore::new(Arc::new(MemoryStore::new())));
        let (transport, feed) = ScriptedTransport::new();
        let pipeline = IngestionPipeline::start(
            Arc::clone(&store),
            transport,
            Arc::new(Subject::new()),
            Arc::new(Subject::new()),
        )
        .await
        .unwrap();

        Fixture {
            pipeline,
            feed,
            store,
        }
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_start_initializes_store_and_connects() {
        let fx = fixture().await;

        assert_eq!(fx.pipeline.status(), ConnectionStatus::Connected);
        // initialize() ran: every location key reads as an empty list.
        assert_eq!(
            fx.store.get_all(&Location::Bedroom).await.unwrap(),
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn test_failed_connect_surfaces_and_leaves_disconnected() {
        let store = Arc::new(EventStore::new(Arc::new(MemoryStore::new())));
        let (mut transport, _feed) = ScriptedTransport::new();
        transport.fail_connect = true;

        let result = IngestionPipeline::start(
            store,
            transport,
            Arc::new(Subject::new()),
            Arc::new(Subject::new()),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_payload_is_persisted_before_fanout() {
        let fx = fixture().await;

        let seen_in_store = Arc::new(StdMutex::new(None));
        let sink = Arc::clone(&seen_in_store);
        let store = Arc::clone(&fx.store);
        fx.pipeline.messages().attach(move |event: &SensorEvent| {
            // At fan-out time the store must already hold the event; the
            // handler snapshots what a synchronous read would find.
            let store = Arc::clone(&store);
            let sink = Arc::clone(&sink);
            let event = event.clone();
            tokio::spawn(async move {
                let stored = store.get_all(&event.location).await.unwrap();
                *sink.lock().unwrap() = Some(stored.unwrap_or_default().contains(&event));
            });
        });

        fx.feed
            .send(TransportMessage::Payload(
                "2023-01-01T00:00:00Z,kitchen,1,15".to_string(),
            ))
            .await
            .unwrap();
        settle().await;

        assert_eq!(*seen_in_store.lock().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_motion_payload_updates_last_motion_slot() {
        let fx = fixture().await;

        fx.feed
            .send(TransportMessage::Payload(
                "2023-01-01T00:00:00Z,kitchen,1,15".to_string(),
            ))
            .await
            .unwrap();
        settle().await;

        let last = fx.store.last_motion_event().await.unwrap().unwrap();
        assert_eq!(last.location, Location::Kitchen);
        assert_eq!(
            last.timestamp,
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(last.battery_percent, 15);
        assert!(last.motion_detected);
    }

    #[tokio::test]
    async fn test_non_motion_payload_leaves_last_motion_slot() {
        let fx = fixture().await;

        fx.feed
            .send(TransportMessage::Payload(
                "2023-01-01T00:00:00Z,kitchen,1,90".to_string(),
            ))
            .await
            .unwrap();
        settle().await;
        let armed = fx.store.last_motion_event().await.unwrap().unwrap();

        fx.feed
            .send(TransportMessage::Payload(
                "2023-01-01T00:05:00Z,living,0,90".to_string(),
            ))
            .await
            .unwrap();
        settle().await;

        // Still the kitchen event.
        assert_eq!(fx.store.last_motion_event().await.unwrap(), Some(armed));
    }

    #[tokio::test]
    async fn test_garbage_payload_degrades_but_still_flows() {
        let fx = fixture().await;

        let seen = Arc::new(StdMutex::new(None));
        let sink = Arc::clone(&seen);
        fx.pipeline.messages().attach(move |event: &SensorEvent| {
            *sink.lock().unwrap() = Some(event.clone());
        });

        fx.feed
            .send(TransportMessage::Payload("not a reading".to_string()))
            .await
            .unwrap();
        settle().await;

        let event = seen.lock().unwrap().clone().unwrap();
        assert_eq!(event.timestamp, None);
        assert_eq!(event.location, Location::Other("Unknown".to_string()));
        assert!(!event.motion_detected);
        assert_eq!(event.battery_percent, -1);
    }

    #[tokio::test]
    async fn test_transport_failure_flips_status_and_publishes() {
        let fx = fixture().await;

        let failures = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        fx.pipeline.failures().attach(move |error: &TransportError| {
            sink.lock().unwrap().push(error.to_string());
        });

        fx.feed
            .send(TransportMessage::Failure(TransportError::ConnectionLost(
                "broker went away".to_string(),
            )))
            .await
            .unwrap();
        settle().await;

        assert_eq!(fx.pipeline.status(), ConnectionStatus::Disconnected);
        assert_eq!(failures.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_close_disconnects() {
        let fx = fixture().await;

        drop(fx.feed);
        settle().await;

        assert_eq!(fx.pipeline.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_transport() {
        let fx = fixture().await;

        drop(fx.feed);
        fx.pipeline.shutdown().await.unwrap();

        assert_eq!(fx.pipeline.status(), ConnectionStatus::Disconnected);
    }
}
