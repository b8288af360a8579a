//! Append-only per-location event log over a [`KeyValueStore`].
//!
//! One JSON array per location key (insertion order = arrival order), plus
//! a single slot for the most recent motion event system-wide. The store
//! deliberately offers at-least-once semantics: `append` is a
//! load-mutate-store cycle with no transaction, and the domain tolerates a
//! rare duplicate or lost reading.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::kv::KeyValueStore;
use crate::model::{Location, SensorEvent};

/// Storage key for the most recent motion event.
pub const LAST_SEEN_KEY: &str = "@lastSeenEvent";

/// Storage key for persisted user settings (owned by homewatch-core).
pub const USER_SETTINGS_KEY: &str = "@userSettings";

/// Every per-location event key, including the catch-all.
pub const EVENT_KEYS: [&str; 6] = [
    "@bedroomEvents",
    "@livingEvents",
    "@toiletEvents",
    "@kitchenEvents",
    "@diningEvents",
    "@otherEvents",
];

/// The append-only event log.
///
/// [`EventStore::initialize`] must run to completion before appends and
/// queries are trusted; it seeds an empty array for every location key so
/// the store is always fully initialized before first use.
pub struct EventStore {
    kv: Arc<dyn KeyValueStore>,
}

impl EventStore {
    /// Create a store over the given backend.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Map a location to its storage key.
    ///
    /// Many-to-one and deterministic: every unknown location shares the
    /// catch-all `@otherEvents` key.
    pub fn storage_key(location: &Location) -> &'static str {
        match location {
            Location::Bedroom => "@bedroomEvents",
            Location::Living => "@livingEvents",
            Location::Toilet => "@toiletEvents",
            Location::Kitchen => "@kitchenEvents",
            Location::Dining => "@diningEvents",
            Location::Other(_) => "@otherEvents",
        }
    }

    /// Ensure an empty sequence exists for every location key.
    ///
    /// Idempotent: keys that already hold a value are left alone.
    pub async fn initialize(&self) -> Result<()> {
        let mut missing = Vec::new();
        for key in EVENT_KEYS {
            if self.kv.get(key).await.map_err(StoreError::Kv)?.is_none() {
                missing.push(key);
            }
        }

        let writes = missing
            .into_iter()
            .map(|key| self.kv.set(key, "[]".to_string()));
        for result in join_all(writes).await {
            result.map_err(StoreError::Kv)?;
        }
        Ok(())
    }

    /// Append one event under its location's key.
    ///
    /// Loads the current sequence, pushes, and persists the whole array
    /// back. A stored value that is not a JSON array is logged and treated
    /// as empty, then overwritten by this write.
    pub async fn append(&self, event: &SensorEvent) -> Result<()> {
        let key = Self::storage_key(&event.location);
        let mut events = match self.load_events(key).await? {
            Some(events) => events,
            None => {
                tracing::warn!(key, "appending to a key that was never initialized");
                Vec::new()
            }
        };
        events.push(event.clone());
        self.persist_events(key, &events).await
    }

    /// All events for a location, in arrival order.
    ///
    /// Returns `None` only when the key has truly never been initialized.
    pub async fn get_all(&self, location: &Location) -> Result<Option<Vec<SensorEvent>>> {
        self.load_events(Self::storage_key(location)).await
    }

    /// Reset one location's sequence to empty.
    pub async fn clear(&self, location: &Location) -> Result<()> {
        self.kv
            .set(Self::storage_key(location), "[]".to_string())
            .await
            .map_err(StoreError::Kv)
    }

    /// Reset every location's sequence to empty, concurrently.
    pub async fn clear_all(&self) -> Result<()> {
        let writes = EVENT_KEYS
            .iter()
            .map(|key| self.kv.set(key, "[]".to_string()));
        for result in join_all(writes).await {
            result.map_err(StoreError::Kv)?;
        }
        Ok(())
    }

    /// Persist `event` as the authoritative "subject last seen" signal.
    ///
    /// Callers only invoke this for events with `motion_detected` raised;
    /// the slot is what the dashboard and the inactivity monitor's boot
    /// sequence consume.
    pub async fn set_last_motion_event(&self, event: &SensorEvent) -> Result<()> {
        let raw = serde_json::to_string(event)?;
        self.kv
            .set(LAST_SEEN_KEY, raw)
            .await
            .map_err(StoreError::Kv)
    }

    /// The most recent motion event, if one was ever recorded.
    pub async fn last_motion_event(&self) -> Result<Option<SensorEvent>> {
        let raw = match self.kv.get(LAST_SEEN_KEY).await.map_err(StoreError::Kv)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if value.is_object() => Ok(Some(SensorEvent::from_persisted(&value))),
            _ => {
                tracing::warn!(key = LAST_SEEN_KEY, "stored last-motion value is not an object");
                Ok(None)
            }
        }
    }

    /// Load and decode one key's event array.
    ///
    /// `None` means the key was never written; a corrupt or non-array value
    /// is logged and read as empty rather than failing.
    async fn load_events(&self, key: &str) -> Result<Option<Vec<SensorEvent>>> {
        let raw = match self.kv.get(key).await.map_err(StoreError::Kv)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => Ok(Some(
                items.iter().map(SensorEvent::from_persisted).collect(),
            )),
            _ => {
                tracing::warn!(key, "stored value was not an array, reading as empty");
                Ok(Some(Vec::new()))
            }
        }
    }

    async fn persist_events(&self, key: &str, events: &[SensorEvent]) -> Result<()> {
        let raw = serde_json::to_string(events)?;
        self.kv.set(key, raw).await.map_err(StoreError::Kv)
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore").finish_non_exhaustive()
    }
}
