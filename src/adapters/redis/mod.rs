//! Redis adapter.
//!
//! This module provides Redis-backed implementations of:
//! - `MetadataStore` for video records
//! - `SessionStore` for chunked uploads that survive restarts and are
//!   shared by every serving process

mod pool;
mod repository;
mod sessions;

pub use pool::RedisPool;

/// Redis key constants
const VIDEO_RECORD_PREFIX: &str = "hlsforge:video:";
const UPLOAD_SESSION_PREFIX: &str = "hlsforge:upload:";

fn session_key(session_id: &str) -> String {
    format!("{}{}", UPLOAD_SESSION_PREFIX, session_id)
}

fn chunks_key(session_id: &str) -> String {
    format!("{}{}:chunks", UPLOAD_SESSION_PREFIX, session_id)
}

fn finalizing_key(session_id: &str) -> String {
    format!("{}{}:finalizing", UPLOAD_SESSION_PREFIX, session_id)
}
