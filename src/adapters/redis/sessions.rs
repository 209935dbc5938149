//! Redis SessionStore implementation.
//!
//! Layout per session: a JSON record, a SET of received chunk indices and a
//! finalize marker. All three carry the session TTL, so a session that stops
//! receiving chunks disappears on its own.

use super::pool::RedisPool;
use super::{chunks_key, finalizing_key, session_key};
use crate::domain::media::UploadSession;
use crate::error::{AppError, Result};
use crate::ports::sessions::{ChunkProgress, SessionStore};
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use std::time::Duration;

#[async_trait]
impl SessionStore for RedisPool {
    async fn create(&self, session: &UploadSession) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(session)?;
        redis::pipe()
            .atomic()
            .set_ex(session_key(&session.id), json, self.session_ttl_secs() as u64)
            .ignore()
            .del(chunks_key(&session.id))
            .ignore()
            .del(finalizing_key(&session.id))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<UploadSession>> {
        let mut conn = self.pool.get().await?;
        let json: Option<String> = conn.get(session_key(session_id)).await?;
        let Some(json) = json else {
            return Ok(None);
        };
        let mut session: UploadSession = serde_json::from_str(&json)?;
        let received: Vec<u32> = conn.smembers(chunks_key(session_id)).await?;
        session.received = received.into_iter().collect();
        Ok(Some(session))
    }

    async fn record_chunk(&self, session_id: &str, index: u32) -> Result<ChunkProgress> {
        let mut conn = self.pool.get().await?;
        let json: Option<String> = conn.get(session_key(session_id)).await?;
        let session: UploadSession = match json {
            Some(json) => serde_json::from_str(&json)?,
            None => return Err(AppError::NotFound(format!("upload session {}", session_id))),
        };

        let ttl = self.session_ttl_secs();
        let (received,): (u32,) = redis::pipe()
            .atomic()
            .sadd(chunks_key(session_id), index)
            .ignore()
            .expire(chunks_key(session_id), ttl)
            .ignore()
            .expire(session_key(session_id), ttl)
            .ignore()
            .scard(chunks_key(session_id))
            .query_async(&mut conn)
            .await?;

        Ok(ChunkProgress {
            received,
            total: session.total_chunks,
        })
    }

    async fn claim_finalize(&self, session_id: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let claimed: Option<String> = redis::cmd("SET")
            .arg(finalizing_key(session_id))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(self.session_ttl_secs())
            .query_async(&mut conn)
            .await?;
        Ok(claimed.is_some())
    }

    async fn release_finalize(&self, session_id: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(finalizing_key(session_id)).await?;
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(&[
            session_key(session_id),
            chunks_key(session_id),
            finalizing_key(session_id),
        ])
        .await?;
        Ok(())
    }

    async fn expire_idle(&self, _max_idle: Duration) -> Result<Vec<UploadSession>> {
        // Keys carry the session TTL and expire on their own.
        Ok(Vec::new())
    }
}
