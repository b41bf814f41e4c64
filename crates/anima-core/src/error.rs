//! Error types for the ANIMA core.

/// Store-level failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The store could not be reached in time (pool exhausted or closed).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound transport failures. Always logged and swallowed by the engine.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("messaging API rejected the request with status {0}")]
    Status(u16),
}

/// Failures surfaced by [`crate::ConversationEngine::handle_update`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Idempotency could not be checked; the caller should retry delivery.
    #[error("store unavailable during idempotency check: {0}")]
    Unavailable(#[source] StoreError),
}
