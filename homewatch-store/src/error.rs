//! Error types for the homewatch-store crate.

use crate::kv::KvError;

/// Errors that can occur while reading or writing the event log.
///
/// Note that malformed *content* (a stored value that is not the expected
/// JSON array/object) is not an error at this level: the store logs it and
/// degrades to an empty value, per the storage shape rules. Only backend
/// I/O failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key-value backend failed
    #[error("key-value backend error: {0}")]
    Kv(#[from] KvError),

    /// An event failed to serialize for persistence
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Convenience type alias for Results using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;
