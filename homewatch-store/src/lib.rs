//! Sensor event storage for homewatch
//!
//! This crate holds everything below the monitoring layer:
//!
//! - [`SensorEvent`] and [`Location`]: the immutable event model
//! - the event codec: transport (CSV) and persisted (JSON) decoding with
//!   sentinel-based degradation, never hard failures
//! - [`KeyValueStore`]: the abstract string-keyed storage collaborator, with
//!   in-memory and JSON-file-per-key implementations
//! - [`EventStore`]: the append-only per-location event log plus the single
//!   "last motion event" slot
//!
//! # Storage layout
//!
//! ```text
//! KeyValueStore (string -> JSON string)
//!     ├── @bedroomEvents   [SensorEvent, ...]
//!     ├── @livingEvents    [SensorEvent, ...]
//!     ├── @toiletEvents    [SensorEvent, ...]
//!     ├── @kitchenEvents   [SensorEvent, ...]
//!     ├── @diningEvents    [SensorEvent, ...]
//!     ├── @otherEvents     [SensorEvent, ...]   (catch-all)
//!     ├── @lastSeenEvent   SensorEvent          (most recent motion)
//!     └── @userSettings    Settings             (owned by homewatch-core)
//! ```

pub mod codec;
pub mod error;
pub mod kv;
pub mod model;
pub mod store;

pub use error::{Result, StoreError};
pub use kv::{JsonFileStore, KeyValueStore, KvError, MemoryStore};
pub use model::{Location, SensorEvent};
pub use store::{EventStore, EVENT_KEYS, LAST_SEEN_KEY, USER_SETTINGS_KEY};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::kv::{KeyValueStore, MemoryStore};
    pub use crate::model::{Location, SensorEvent};
    pub use crate::store::EventStore;
}
