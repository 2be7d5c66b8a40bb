//! Error taxonomy for the ingestion and search pipeline.
//!
//! Every fallible operation in the core returns [`Result<T>`]. Variants are
//! tagged so the retry manager can classify a failure without inspecting
//! free-form messages, and so callers can distinguish invalid requests from
//! backend trouble.

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the media pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Asset, version, or object missing. Surfaced to the caller, not retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate deterministic identifier. Treated as success by ingest.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Unsupported, corrupt, or undecodable media input.
    #[error("media format error: {0}")]
    MediaFormat(String),

    /// Engine setup problem: missing model, invalid parameters.
    #[error("engine configuration error: {0}")]
    EngineConfig(String),

    /// Timeout, connection reset, rate limiting, service unavailability.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Engine busy, temporary compute exhaustion.
    #[error("transient resource error: {0}")]
    TransientResource(String),

    /// Authorization, quota, or contract violations from external services.
    #[error("permanent downstream error: {0}")]
    PermanentDownstream(String),

    /// Wall-clock budget exceeded. Counts as an attempt, retryable.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Malformed request: empty query, wrong vector dimension, bad range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Bad or missing configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Database or object store backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation. Logged loudly, aborts the current operation.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable with backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TransientNetwork(_)
            | Error::TransientResource(_)
            | Error::Timeout(_)
            | Error::Storage(_)
            | Error::Io(_) => true,
            Error::NotFound(_)
            | Error::AlreadyExists(_)
            | Error::MediaFormat(_)
            | Error::EngineConfig(_)
            | Error::PermanentDownstream(_)
            | Error::InvalidInput(_)
            | Error::Configuration(_)
            | Error::Serialization(_)
            | Error::Internal(_) => false,
        }
    }

    /// Check if this error should surface as a caller fault (4xx-style)
    #[must_use]
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::NotFound(_))
    }
}
