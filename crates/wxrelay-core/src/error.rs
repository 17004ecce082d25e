use crate::types::JobKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("source fetch failed: {0}")]
    SourceFetch(#[from] FetchError),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("{0} job is already running")]
    AlreadyRunning(JobKind),

    #[error("unknown job '{0}': expected 'signals' or 'bulletins'")]
    UnknownJob(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure to obtain a batch from a source feed. Always aborts the cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("source responded with HTTP {0}")]
    Status(u16),

    /// The response parsed, but the expected envelope was missing.
    #[error("invalid response format: {0}")]
    Shape(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook responded with HTTP {0}")]
    Status(u16),

    #[error("could not decode webhook response: {0}")]
    Decode(String),
}

/// Raw failure of a single cache-store operation, before retries.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cache store is not connected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, RelayError>;
