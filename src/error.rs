//! Error taxonomy shared by every component.
//!
//! Each variant carries enough context (rung name, chunk index, upstream
//! URL/status) for a caller to log it and pick a fallback. Nothing in this
//! crate retries on its own.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing request field.
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream answered with a non-success status.
    #[error("Upstream returned HTTP {status} for {url}")]
    Upstream { url: String, status: u16 },

    /// Upstream could not be reached (connect/TLS/body read failure).
    #[error("Upstream request to {url} failed: {reason}")]
    UpstreamUnreachable { url: String, reason: String },

    #[error("Upstream request to {url} timed out")]
    UpstreamTimeout { url: String },

    /// Upstream answered 2xx but the body is not an HLS playlist.
    #[error("Upstream response from {url} is not an HLS playlist")]
    NotAPlaylist { url: String },

    #[error("Encoding rung {rung} failed: {diagnostic}")]
    Encode { rung: String, diagnostic: String },

    #[error("Transcode job for {video_id} exceeded its {budget:?} budget")]
    JobTimeout { video_id: String, budget: Duration },

    #[error("Transcode job for {0} was cancelled")]
    Cancelled(String),

    /// Chunk-session inconsistency. Not recoverable by the server.
    #[error("Upload session {session_id}: {reason}")]
    SessionState { session_id: String, reason: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn encode(rung: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::Encode {
            rung: rung.into(),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn session_state(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionState {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether a caller may safely retry the same idempotent request.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::UpstreamTimeout { .. } | AppError::UpstreamUnreachable { .. } => true,
            AppError::Upstream { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            _ => false,
        }
    }

    /// Upstream status carried by the error, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<deadpool_redis::redis::RedisError> for AppError {
    fn from(err: deadpool_redis::redis::RedisError) -> Self {
        AppError::Storage(format!("Redis error: {}", err))
    }
}

impl From<deadpool_redis::PoolError> for AppError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        AppError::Storage(format!("Redis pool error: {}", err))
    }
}

impl From<deadpool_redis::CreatePoolError> for AppError {
    fn from(err: deadpool_redis::CreatePoolError) -> Self {
        AppError::Storage(format!("Create pool error: {}", err))
    }
}
