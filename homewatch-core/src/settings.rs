//! Process-wide user settings with change notification.
//!
//! Exactly one authoritative [`Settings`] record exists per process, cached
//! inside [`SettingsStore`] and persisted under the `@userSettings` key.
//! Every write persists first, then broadcasts to subscribers; monitors
//! mirror the thresholds from that broadcast instead of re-reading settings
//! per event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use observer_bus::{Subject, SubscriptionId};
use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use homewatch_store::{KeyValueStore, USER_SETTINGS_KEY};

/// Default battery alert threshold, percent.
pub const DEFAULT_BATTERY_THRESHOLD: i32 = 5;

/// Default inactivity alert threshold, minutes.
pub const DEFAULT_INACTIVITY_THRESHOLD: i32 = 5;

/// Default retention for stored readings, days.
pub const DEFAULT_DATA_RETENTION_DAYS: u32 = 365;

/// Alert suppression state.
///
/// A timed mute auto-reverts to [`MuteStatus::Enabled`] the first time it
/// is checked after its deadline (see
/// [`crate::notify::NotificationGate::is_suppressed`]).
///
/// Serialized as `"enable"`, `"mute"` or an RFC 3339 timestamp, matching
/// the persisted format of the companion apps.
#[derive(Debug, Clone, PartialEq)]
pub enum MuteStatus {
    /// Alerts fire normally
    Enabled,
    /// Alerts suppressed indefinitely
    Muted,
    /// Alerts suppressed until the given instant
    MutedUntil(DateTime<Utc>),
}

impl Serialize for MuteStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MuteStatus::Enabled => serializer.serialize_str("enable"),
            MuteStatus::Muted => serializer.serialize_str("mute"),
            MuteStatus::MutedUntil(until) => serializer.serialize_str(&until.to_rfc3339()),
        }
    }
}

impl<'de> Deserialize<'de> for MuteStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "enable" => Ok(MuteStatus::Enabled),
            "mute" => Ok(MuteStatus::Muted),
            // Anything else is reinterpreted as a timestamp; an unparseable
            // one fails validation and the caller falls back to defaults.
            other => DateTime::parse_from_rfc3339(other)
                .map(|until| MuteStatus::MutedUntil(until.with_timezone(&Utc)))
                .map_err(|_| {
                    D::Error::custom(format!(
                        "mute status is neither a known state nor a timestamp: {other}"
                    ))
                }),
        }
    }
}

/// The single mutable settings record.
///
/// Treated as immutable once handed out: components never mutate a
/// `Settings` they received, they build a new one and write it through
/// [`SettingsStore::set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// How long stored readings are kept. Reserved for a retention policy;
    /// no monitor reads it.
    pub data_retention_days: u32,
    /// Alert suppression state.
    pub mute_status: MuteStatus,
    /// Percent below which battery alerts fire; negative disables them.
    pub battery_threshold: i32,
    /// Minutes of quiet before an inactivity alert fires; negative
    /// disables it.
    pub inactivity_threshold: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_retention_days: DEFAULT_DATA_RETENTION_DAYS,
            mute_status: MuteStatus::Enabled,
            battery_threshold: DEFAULT_BATTERY_THRESHOLD,
            inactivity_threshold: DEFAULT_INACTIVITY_THRESHOLD,
        }
    }
}

/// The process-wide settings store.
///
/// `get` lazily initializes from storage (falling back to defaults when
/// the persisted copy is missing or fails validation); `set` persists and
/// then broadcasts. The cache mutex is held across the whole
/// initialization, so two concurrent cold `get`s never both hit storage.
pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
    cached: Mutex<Option<Settings>>,
    subject: Subject<Settings>,
}

impl SettingsStore {
    /// Create a store over the given backend. Nothing is loaded until the
    /// first `get`.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            cached: Mutex::new(None),
            subject: Subject::new(),
        }
    }

    /// The current settings.
    ///
    /// Returns the cached copy when present; otherwise initializes from
    /// storage. A persisted copy that is missing or fails validation is
    /// replaced by defaults, which are persisted as the new baseline.
    /// Initialization notifies subscribers once with the resulting value.
    pub async fn get(&self) -> Settings {
        let mut cached = self.cached.lock().await;
        if let Some(settings) = cached.as_ref() {
            return settings.clone();
        }

        let (settings, fell_back) = self.load().await;
        if fell_back {
            self.persist(&settings).await;
        }
        *cached = Some(settings.clone());
        drop(cached);

        self.subject.notify(&settings);
        settings
    }

    /// Replace the settings: persist, update the cache, then broadcast.
    ///
    /// Echoes its argument back. A persistence failure is logged and the
    /// in-memory copy still advances, so observers converge on the newest
    /// value either way.
    pub async fn set(&self, settings: Settings) -> Settings {
        self.persist(&settings).await;
        {
            *self.cached.lock().await = Some(settings.clone());
        }
        self.subject.notify(&settings);
        settings
    }

    /// Attach an observer for settings changes.
    ///
    /// Every observer attached at the time of a `set` receives that value
    /// exactly once.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Settings) + Send + Sync + 'static,
    {
        self.subject.attach(handler)
    }

    /// Detach a previously attached observer.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subject.detach(id)
    }

    async fn load(&self) -> (Settings, bool) {
        match self.kv.get(USER_SETTINGS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => (settings, false),
                Err(error) => {
                    tracing::warn!(%error, "stored settings failed validation, using defaults");
                    (Settings::default(), true)
                }
            },
            Ok(None) => (Settings::default(), true),
            Err(error) => {
                tracing::warn!(%error, "could not read stored settings, using defaults");
                (Settings::default(), true)
            }
        }
    }

    async fn persist(&self, settings: &Settings) {
        let raw = match serde_json::to_string(settings) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%error, "failed to serialize settings");
                return;
            }
        };
        if let Err(error) = self.kv.set(USER_SETTINGS_KEY, raw).await {
            tracing::warn!(%error, "failed to persist settings");
        }
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("subscribers", &self.subject.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use homewatch_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> (SettingsStore, MemoryStore) {
        let kv = MemoryStore::new();
        (SettingsStore::new(Arc::new(kv.clone())), kv)
    }

    #[test]
    fn test_mute_status_serde_round_trip() {
        for status in [
            MuteStatus::Enabled,
            MuteStatus::Muted,
            MuteStatus::MutedUntil(Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap()),
        ] {
            let raw = serde_json::to_string(&status).unwrap();
            let back: MuteStatus = serde_json::from_str(&raw).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_mute_status_rejects_garbage() {
        assert!(serde_json::from_str::<MuteStatus>("\"sometimes\"").is_err());
    }

    #[tokio::test]
    async fn test_get_on_empty_storage_persists_defaults() {
        let (store, kv) = store();

        let settings = store.get().await;
        assert_eq!(settings, Settings::default());

        // The defaults became the new persisted baseline.
        let raw = kv.get(USER_SETTINGS_KEY).await.unwrap().unwrap();
        let persisted: Settings = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, Settings::default());
    }

    #[tokio::test]
    async fn test_get_reads_valid_persisted_settings() {
        let (store, kv) = store();
        let stored = Settings {
            battery_threshold: 33,
            ..Settings::default()
        };
        kv.set(USER_SETTINGS_KEY, serde_json::to_string(&stored).unwrap())
            .await
            .unwrap();

        assert_eq!(store.get().await.battery_threshold, 33);
    }

    #[tokio::test]
    async fn test_timed_mute_string_reinterpreted_as_datetime() {
        let (store, kv) = store();
        kv.set(
            USER_SETTINGS_KEY,
            r#"{"dataRetentionDays":365,"muteStatus":"2030-01-01T00:00:00+00:00","batteryThreshold":5,"inactivityThreshold":5}"#.to_string(),
        )
        .await
        .unwrap();

        let settings = store.get().await;
        assert_eq!(
            settings.mute_status,
            MuteStatus::MutedUntil(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_invalid_persisted_settings_fall_back_to_defaults() {
        let (store, kv) = store();
        kv.set(USER_SETTINGS_KEY, r#"{"muteStatus":"enable"}"#.to_string())
            .await
            .unwrap();

        assert_eq!(store.get().await, Settings::default());

        // And the baseline was repaired in storage.
        let raw = kv.get(USER_SETTINGS_KEY).await.unwrap().unwrap();
        assert!(serde_json::from_str::<Settings>(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_set_then_get_returns_equal_value() {
        let (store, _kv) = store();

        let updated = Settings {
            battery_threshold: 42,
            inactivity_threshold: 7,
            ..Settings::default()
        };
        let echoed = store.set(updated.clone()).await;

        assert_eq!(echoed, updated);
        assert_eq!(store.get().await, updated);
    }

    #[tokio::test]
    async fn test_subscribers_receive_each_set_exactly_once() {
        let (store, _kv) = store();
        let count = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&count);
        let id = store.subscribe(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        store.set(Settings::default()).await;
        store
            .set(Settings {
                battery_threshold: 1,
                ..Settings::default()
            })
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(store.unsubscribe(id));
        store.set(Settings::default()).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subscriber_sees_the_written_value() {
        let (store, _kv) = store();
        let seen = Arc::new(std::sync::Mutex::new(None));

        let sink = Arc::clone(&seen);
        store.subscribe(move |settings: &Settings| {
            *sink.lock().unwrap() = Some(settings.battery_threshold);
        });

        store
            .set(Settings {
                battery_threshold: 77,
                ..Settings::default()
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), Some(77));
    }
}
