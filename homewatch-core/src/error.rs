//! Error types for the homewatch-core crate.

use homewatch_store::StoreError;

use crate::transport::TransportError;

/// Errors surfaced by the monitoring core.
///
/// Most failure modes in this core degrade rather than propagate (see the
/// crate docs); what remains here is the startup path, where a storage or
/// transport failure genuinely prevents the pipeline from coming up.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The event store or settings backend failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The feed transport failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Convenience type alias for Results using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
