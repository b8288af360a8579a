//! The abstract key-value storage collaborator.
//!
//! Everything this crate persists goes through [`KeyValueStore`]:
//! string keys, string values, JSON payloads by convention. The mobile
//! shells plug their platform storage in here; this crate ships an
//! in-memory implementation for tests and a JSON-file-per-key
//! implementation for headless use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Errors from a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// An I/O error from a file-backed store
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No usable storage location could be resolved
    #[error("no storage location available: {0}")]
    NoLocation(String),

    /// Backend-specific failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Asynchronous string-keyed, string-valued storage.
///
/// Both operations may suspend on I/O. `get` returns `None` for a key that
/// has never been written.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;
}

// ============================================================================
// MemoryStore - process-local backend for tests and previews
// ============================================================================

/// In-memory [`KeyValueStore`].
///
/// Clones share the same map, mirroring how every component holds a
/// reference to the one platform store in production.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================================================
// JsonFileStore - one JSON file per key under a data directory
// ============================================================================

/// File-backed [`KeyValueStore`] storing each key as `<key>.json`.
///
/// Keys are sanitized for the filesystem (the conventional `@` prefix is
/// stripped, path separators replaced), so `@kitchenEvents` lands in
/// `kitchenEvents.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store under the platform data directory
    /// (`<data_dir>/homewatch`).
    pub fn in_data_dir() -> Result<Self, KvError> {
        let base = dirs::data_dir()
            .ok_or_else(|| KvError::NoLocation("platform data directory unknown".to_string()))?;
        Ok(Self::new(base.join("homewatch")))
    }

    /// The directory this store writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let stem: String = key
            .trim_start_matches('@')
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.root.join(format!("{stem}.json"))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }
}
