//! Low-battery alerts.

use std::sync::Arc;

use observer_bus::{Subject, SubscriptionId};
use parking_lot::RwLock;

use homewatch_store::{EventStore, SensorEvent};

use crate::notify::NotificationGate;
use crate::settings::{Settings, SettingsStore};

const ALERT_BODY: &str = "Check the sensor before it dies";

/// Raises an alert whenever a reading arrives with a valid battery level
/// strictly below the configured threshold.
///
/// The threshold is mirrored locally and refreshed from settings changes,
/// so evaluating an event never reads settings. A negative threshold
/// disables the monitor. Readings without a battery level (the `-1`
/// sentinel) never alert regardless of the threshold.
pub struct BatteryMonitor {
    threshold: Arc<RwLock<i32>>,
    settings: Arc<SettingsStore>,
    messages: Arc<Subject<SensorEvent>>,
    message_sub: SubscriptionId,
    settings_sub: SubscriptionId,
}

impl BatteryMonitor {
    /// Attach a battery monitor to the message stream.
    ///
    /// Seeds the threshold from the current settings, follows every
    /// settings change, and evaluates the persisted last motion event once
    /// so a reading that went low while the process was down still alerts.
    pub async fn start(
        settings: Arc<SettingsStore>,
        store: Arc<EventStore>,
        gate: Arc<NotificationGate>,
        messages: Arc<Subject<SensorEvent>>,
    ) -> Self {
        let threshold = Arc::new(RwLock::new(settings.get().await.battery_threshold));

        let mirror = Arc::clone(&threshold);
        let settings_sub = settings.subscribe(move |updated: &Settings| {
            *mirror.write() = updated.battery_threshold;
        });

        let mirror = Arc::clone(&threshold);
        let alert_gate = Arc::clone(&gate);
        let message_sub = messages.attach(move |event: &SensorEvent| {
            let threshold = *mirror.read();
            if !Self::is_low(event, threshold) {
                return;
            }
            let gate = Arc::clone(&alert_gate);
            let title = Self::alert_title(event);
            tokio::spawn(async move {
                gate.fire(&title, ALERT_BODY).await;
            });
        });

        let monitor = Self {
            threshold,
            settings,
            messages,
            message_sub,
            settings_sub,
        };
        monitor.prime(store, gate).await;
        monitor
    }

    /// The threshold currently applied, as last mirrored from settings.
    pub fn threshold(&self) -> i32 {
        *self.threshold.read()
    }

    /// Change the threshold for every observer at once.
    ///
    /// Writes through the settings store rather than the local mirror, so
    /// the mirror, the persisted copy and any other subscriber converge on
    /// the same value.
    pub async fn set_threshold(&self, level: i32) {
        let current = self.settings.get().await;
        self.settings
            .set(Settings {
                battery_threshold: level,
                ..current
            })
            .await;
    }

    /// Detach from both streams. Alerts already in flight still deliver.
    pub fn stop(&self) {
        self.messages.detach(self.message_sub);
        self.settings.unsubscribe(self.settings_sub);
    }

    async fn prime(&self, store: Arc<EventStore>, gate: Arc<NotificationGate>) {
        let last = match store.last_motion_event().await {
            Ok(last) => last,
            Err(error) => {
                tracing::warn!(%error, "could not read last motion event for battery check");
                return;
            }
        };
        if let Some(event) = last {
            if Self::is_low(&event, self.threshold()) {
                gate.fire(&Self::alert_title(&event), ALERT_BODY).await;
            }
        }
    }

    fn alert_title(event: &SensorEvent) -> String {
        format!(
            "{} has low battery level ({}%)",
            event.location.name(),
            event.battery_percent
        )
    }

    fn is_low(event: &SensorEvent, threshold: i32) -> bool {
        if threshold < 0 {
            return false;
        }
        event.battery_percent >= 0 && event.battery_percent < threshold
    }
}

impl std::fmt::Debug for BatteryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatteryMonitor")
            .field("threshold", &self.threshold())
            .finish()
    }
}
