//! Inactivity alerts.
//!
//! Every motion event arms a deferred check for `threshold` minutes after
//! the event's timestamp. Checks are fire-and-forget: nothing cancels a
//! timer when newer motion arrives. Instead the check re-validates at fire
//! time, against the live threshold and the persisted last motion event,
//! and stays silent when it turns out to be stale. Several checks may be
//! in flight at once; at most the freshest one ever alerts.

use std::sync::Arc;

use chrono::{Duration, Utc};
use observer_bus::{Subject, SubscriptionId};
use parking_lot::RwLock;

use homewatch_store::{EventStore, SensorEvent};

use crate::notify::NotificationGate;
use crate::settings::{Settings, SettingsStore};

struct Inner {
    threshold: RwLock<i32>,
    store: Arc<EventStore>,
    gate: Arc<NotificationGate>,
}

impl Inner {
    /// Schedule a deferred check for this motion event. Non-motion events
    /// and a negative threshold (the off sentinel) arm nothing.
    fn arm(inner: &Arc<Self>, event: SensorEvent) {
        if !event.motion_detected {
            return;
        }
        let threshold = *inner.threshold.read();
        if threshold < 0 {
            return;
        }

        let deadline = event.timestamp.unwrap_or_else(Utc::now) + Duration::minutes(threshold as i64);
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let wait = (deadline - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(wait).await;
            inner.check(event, threshold).await;
        });
    }

    /// The deferred half of `arm`: decide whether the armed event is still
    /// the latest word from the sensors and alert if so.
    async fn check(&self, armed: SensorEvent, armed_threshold: i32) {
        // A threshold change re-arms from scratch; timers captured under
        // the old threshold are stale by definition.
        if *self.threshold.read() != armed_threshold {
            return;
        }

        let last = match self.store.last_motion_event().await {
            Ok(last) => last,
            Err(error) => {
                tracing::warn!(%error, "could not read last motion event, skipping check");
                return;
            }
        };
        // Newer motion has been persisted since this timer was armed.
        if last.as_ref() != Some(&armed) {
            return;
        }

        let last_seen = armed
            .timestamp
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        self.gate
            .fire(
                &format!(
                    "We haven't heard a sensor update in over {armed_threshold} minutes!"
                ),
                &format!("Last seen at {last_seen}"),
            )
            .await;
    }

    /// Re-arm from the persisted last motion event, used after a threshold
    /// change so a decrease can alert without waiting for new motion.
    async fn rearm_from_store(inner: &Arc<Self>) {
        match inner.store.last_motion_event().await {
            Ok(Some(event)) => Self::arm(inner, event),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, "could not read last motion event, skipping re-arm");
            }
        }
    }
}

/// Alerts when no motion has been seen for the configured number of
/// minutes.
pub struct InactivityMonitor {
    inner: Arc<Inner>,
    settings: Arc<SettingsStore>,
    messages: Arc<Subject<SensorEvent>>,
    message_sub: SubscriptionId,
    settings_sub: SubscriptionId,
}

impl InactivityMonitor {
    /// Attach an inactivity monitor to the message stream.
    ///
    /// Seeds the threshold from the current settings, arms an initial
    /// check from the persisted last motion event (so silence across a
    /// restart still alerts), then follows motion events and settings
    /// changes.
    pub async fn start(
        settings: Arc<SettingsStore>,
        store: Arc<EventStore>,
        gate: Arc<NotificationGate>,
        messages: Arc<Subject<SensorEvent>>,
    ) -> Self {
        let inner = Arc::new(Inner {
            threshold: RwLock::new(settings.get().await.inactivity_threshold),
            store,
            gate,
        });

        let handle = Arc::clone(&inner);
        let message_sub = messages.attach(move |event: &SensorEvent| {
            Inner::arm(&handle, event.clone());
        });

        let handle = Arc::clone(&inner);
        let settings_sub = settings.subscribe(move |updated: &Settings| {
            *handle.threshold.write() = updated.inactivity_threshold;
            let handle = Arc::clone(&handle);
            tokio::spawn(async move {
                Inner::rearm_from_store(&handle).await;
            });
        });

        Inner::rearm_from_store(&inner).await;

        Self {
            inner,
            settings,
            messages,
            message_sub,
            settings_sub,
        }
    }

    /// The threshold currently applied, in minutes.
    pub fn threshold(&self) -> i32 {
        *self.inner.threshold.read()
    }

    /// Change the threshold for every observer at once, through the
    /// settings store.
    pub async fn set_threshold(&self, minutes: i32) {
        let current = self.settings.get().await;
        self.settings
            .set(Settings {
                inactivity_threshold: minutes,
                ..current
            })
            .await;
    }

    /// Detach from both streams. Timers already armed still run their
    /// checks, but a subsequent threshold change makes them all stale.
    pub fn stop(&self) {
        self.messages.detach(self.message_sub);
        self.settings.unsubscribe(self.settings_sub);
    }
}

impl std::fmt::Debug for InactivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InactivityMonitor")
            .field("threshold", &self.threshold())
            .finish()
    }
}
