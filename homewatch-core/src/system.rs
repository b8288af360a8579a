//! The composition root.
//!
//! [`MonitorSystem::start`] is the one place the pieces of this crate get
//! wired together. Everything environment-specific is injected: the
//! key-value backend, the notification channel and the feed transport.
//! There are no globals; two systems over different backends can coexist
//! in one process, which is also how the tests run.

use std::sync::Arc;

use observer_bus::Subject;

use homewatch_store::{EventStore, KeyValueStore, SensorEvent};

use crate::error::Result;
use crate::monitor::{BatteryMonitor, InactivityMonitor};
use crate::notify::{NotificationGate, Notifier};
use crate::pipeline::IngestionPipeline;
use crate::settings::SettingsStore;
use crate::transport::{Transport, TransportError};

/// A fully wired monitoring system.
///
/// # Example
///
/// ```rust,ignore
/// let kv = Arc::new(JsonFileStore::in_data_dir()?);
/// let transport = Box::new(MqttTransport::new(MqttTransportConfig::default())?);
/// let system = MonitorSystem::start(kv, Arc::new(LogNotifier), transport).await?;
///
/// system.failures().attach(|error| {
///     eprintln!("feed lost: {error}");
/// });
/// ```
pub struct MonitorSystem {
    store: Arc<EventStore>,
    settings: Arc<SettingsStore>,
    gate: Arc<NotificationGate>,
    battery: BatteryMonitor,
    inactivity: InactivityMonitor,
    pipeline: IngestionPipeline,
    messages: Arc<Subject<SensorEvent>>,
    failures: Arc<Subject<TransportError>>,
}

impl MonitorSystem {
    /// Build and start the whole system.
    ///
    /// Monitors attach to the message subject before the transport
    /// connects, so the very first payload is already observed.
    pub async fn start(
        kv: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        let store = Arc::new(EventStore::new(Arc::clone(&kv)));
        let settings = Arc::new(SettingsStore::new(kv));
        let gate = Arc::new(NotificationGate::new(Arc::clone(&settings), notifier));

        let messages: Arc<Subject<SensorEvent>> = Arc::new(Subject::new());
        let failures: Arc<Subject<TransportError>> = Arc::new(Subject::new());

        let battery = BatteryMonitor::start(
            Arc::clone(&settings),
            Arc::clone(&store),
            Arc::clone(&gate),
            Arc::clone(&messages),
        )
        .await;
        let inactivity = InactivityMonitor::start(
            Arc::clone(&settings),
            Arc::clone(&store),
            Arc::clone(&gate),
            Arc::clone(&messages),
        )
        .await;

        let pipeline = IngestionPipeline::start(
            Arc::clone(&store),
            transport,
            Arc::clone(&messages),
            Arc::clone(&failures),
        )
        .await?;

        Ok(Self {
            store,
            settings,
            gate,
            battery,
            inactivity,
            pipeline,
            messages,
            failures,
        })
    }

    /// The event store, for dashboards reading history.
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// The settings store, for settings pages.
    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// The notification gate, for mute menus.
    pub fn gate(&self) -> &Arc<NotificationGate> {
        &self.gate
    }

    pub fn battery(&self) -> &BatteryMonitor {
        &self.battery
    }

    pub fn inactivity(&self) -> &InactivityMonitor {
        &self.inactivity
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    /// Every decoded event, after persistence.
    pub fn messages(&self) -> &Arc<Subject<SensorEvent>> {
        &self.messages
    }

    /// Transport failures, for connection banners and reconnect logic.
    pub fn failures(&self) -> &Arc<Subject<TransportError>> {
        &self.failures
    }

    /// Detach the monitors and disconnect the transport.
    pub async fn shutdown(&self) -> Result<()> {
        self.battery.stop();
        self.inactivity.stop();
        self.pipeline.shutdown().await
    }
}

impl std::fmt::Debug for MonitorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSystem")
            .field("status", &self.pipeline.status())
            .finish_non_exhaustive()
    }
}
