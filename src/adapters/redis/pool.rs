//! Redis connection pool.

use crate::error::Result;
use deadpool_redis::{Config, Pool, Runtime};
use std::time::Duration;

/// Redis-backed adapter for metadata and session operations.
#[derive(Clone)]
pub struct RedisPool {
    pub(super) pool: Pool,
    /// Idle lifetime of upload session keys, refreshed on every chunk.
    pub(super) session_ttl: Duration,
}

impl RedisPool {
    /// Create a new RedisPool with connection pool.
    pub fn new(redis_url: &str, session_ttl: Duration) -> Result<Self> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool, session_ttl })
    }

    pub(super) fn session_ttl_secs(&self) -> i64 {
        self.session_ttl.as_secs().max(1) as i64
    }
}
