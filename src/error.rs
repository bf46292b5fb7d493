// src/error.rs
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// Upstream price API unreachable, non-2xx, or returned a malformed payload
    #[error("Upstream Unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Cache backend (Redis) errors
    #[error("Cache Unavailable: {0}")]
    CacheUnavailable(String),

    /// History repository errors
    #[error("Storage Error: {0}")]
    StorageError(String),

    /// Pair id unknown, or the pair is in the wrong lifecycle state for the operation
    #[error("Pair Not Found: {0}")]
    PairNotFound(String),

    /// Parsing errors for serialized snapshots or payloads
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::UpstreamUnavailable(format!("HTTP error: {}", err))
    }
}

impl From<redis::RedisError> for TrackerError {
    fn from(err: redis::RedisError) -> Self {
        TrackerError::CacheUnavailable(format!("Redis error: {}", err))
    }
}

impl TrackerError {
    /// Whether the condition may clear on its own; recoverable errors are
    /// absorbed by the refresh orchestrator and answered with a fallback
    /// snapshot instead of being surfaced.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TrackerError::UpstreamUnavailable(_) => true,
            TrackerError::CacheUnavailable(_) => true,
            TrackerError::StorageError(_) => true,
            TrackerError::PairNotFound(_) => false, // Client-visible, needs a correct id
            TrackerError::ParseError(_) => false,   // Data format issues aren't recoverable
            TrackerError::ConfigError(_) => false,  // Config needs fixing
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
