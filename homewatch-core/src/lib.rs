//! Event-driven monitoring core for the homewatch dashboard
//!
//! This crate wires the pieces from `homewatch-store` and `observer-bus`
//! into the monitoring pipeline proper:
//!
//! - [`SettingsStore`]: the one authoritative, change-notifying settings
//!   record
//! - [`NotificationGate`]: mute/mute-until logic in front of the abstract
//!   [`Notifier`]
//! - [`IngestionPipeline`]: feed -> decode -> persist -> fan-out, over an
//!   abstract [`Transport`]
//! - [`BatteryMonitor`] and [`InactivityMonitor`]: threshold monitors
//!   deriving alerts from the message stream and live settings
//! - [`MonitorSystem`]: the composition root that builds all of the above
//!   from injected collaborators
//!
//! # Architecture
//!
//! ```text
//! Transport ──> IngestionPipeline ──> EventStore (persist first)
//!                      │
//!                      └──> Subject<SensorEvent> ──┬──> BatteryMonitor ──┐
//!                                                  └──> InactivityMonitor┤
//!                                                                        │
//! SettingsStore ──> Subject<Settings> ─────────────────────(thresholds)──┤
//!                                                                        ▼
//!                                                  NotificationGate ──> Notifier
//! ```
//!
//! No failure in this core terminates the process: decode errors degrade to
//! sentinels, storage shape errors read as empty, transport failures go out
//! on a dedicated failure subject, and notifier errors are logged and
//! swallowed.

pub mod error;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod pipeline;
pub mod settings;
pub mod system;
pub mod transport;

pub use error::{CoreError, Result};
pub use monitor::{BatteryMonitor, InactivityMonitor};
pub use notify::{LogNotifier, MuteOption, NotificationGate, Notifier, NotifyError};
pub use pipeline::{ConnectionStatus, IngestionPipeline};
pub use settings::{MuteStatus, Settings, SettingsStore};
pub use system::MonitorSystem;
pub use transport::{Transport, TransportError, TransportMessage};

// Re-export the collaborating layers so a dashboard shell only needs this
// crate in its dependency list.
pub use homewatch_store as store;
pub use observer_bus::{Subject, SubscriptionId};

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for the unit tests in this crate.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::notify::{Notifier, NotifyError};

    /// A notifier that records every alert it is asked to deliver.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        delivered: Mutex<Vec<(String, String)>>,
        pub fail: std::sync::atomic::AtomicBool,
    }

    impl RecordingNotifier {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn delivered(&self) -> Vec<(String, String)> {
            self.delivered.lock().unwrap().clone()
        }

        pub fn count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, title: &str, body: &str) -> std::result::Result<(), NotifyError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(NotifyError::Delivery("scripted failure".to_string()));
            }
            self.delivered
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            Ok(())
        }
    }
}
