//! Grid tier errors

/// Errors from the grid store and cache tiers
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The backing grid collaborator failed
    #[error("grid backend: {0}")]
    Backend(String),

    /// A named sheet does not exist in the backing grid
    #[error("sheet '{0}' not found")]
    SheetNotFound(String),

    /// A persisted cache payload could not be decoded
    #[error("cache payload corrupt: {0}")]
    CorruptPayload(String),

    /// Snapshot (de)serialization failed
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
