//! Error taxonomy.
//!
//! - [`ConfigError`] is fatal and aborts startup before any remote call.
//! - [`ServiceError`] is an operation level failure of the downstream service
//!   after its own retries were exhausted. It is logged and counted, the run
//!   continues with the next candidate.
//! - [`RemoteError`] describes a single failed remote attempt. Transient
//!   variants are retried inside [`crate::remote::RemoteClient`] and only
//!   surface once the retry budget is spent.
//! - [`CacheError`] covers reading and writing the persistent cache file.
//!
//! An unresolvable identifier or unclassifiable release group is *not* an
//! error; it is the [`crate::types::Classification::Unknown`] outcome.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown music service '{name}', available: {}", .available.join(", "))]
    UnknownService {
        name: String,
        available: Vec<String>,
    },
}

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {status}")]
    Status {
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("resource not found")]
    NotFound,

    #[error("cannot decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Server errors, timeouts, transport failures and rate limit signals.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Timeout | RemoteError::Transport(_) => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            // Last.fm: 11 service offline, 16 temporarily unavailable, 29 rate limit exceeded
            RemoteError::Api { code, .. } => matches!(code, 11 | 16 | 29),
            RemoteError::NotFound | RemoteError::Decode(_) => false,
        }
    }

    /// The "temporarily overloaded" signal of a downstream service.
    pub fn is_overloaded(&self) -> bool {
        matches!(self, RemoteError::Status { status: 503, .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status {
                status: status.as_u16(),
                retry_after: None,
            }
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("[{service}] health check failed: {reason}")]
    Unhealthy { service: String, reason: String },

    #[error("[{service}] {operation} failed: {source}")]
    Request {
        service: String,
        operation: String,
        #[source]
        source: RemoteError,
    },

    #[error("[{service}] {message}")]
    Client { service: String, message: String },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Run level error returned by the CLI workflows.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Cache(#[from] CacheError),
}
