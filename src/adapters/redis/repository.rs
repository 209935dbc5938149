//! Redis MetadataStore implementation.

use super::pool::RedisPool;
use super::VIDEO_RECORD_PREFIX;
use crate::domain::media::VideoRecord;
use crate::error::Result;
use crate::ports::repository::MetadataStore;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use std::time::Duration;

#[async_trait]
impl MetadataStore for RedisPool {
    async fn get(&self, video_id: &str) -> Result<Option<VideoRecord>> {
        let mut conn = self.pool.get().await?;
        let key = format!("{}{}", VIDEO_RECORD_PREFIX, video_id);
        let json: Option<String> = conn.get(&key).await?;
        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, record: &VideoRecord) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let key = format!("{}{}", VIDEO_RECORD_PREFIX, record.id);
        let json = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(&key, json).await?;
        Ok(())
    }

    async fn set_with_expiry(&self, record: &VideoRecord, ttl: Duration) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let key = format!("{}{}", VIDEO_RECORD_PREFIX, record.id);
        let json = serde_json::to_string(record)?;
        conn.set_ex::<_, _, ()>(&key, json, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn delete(&self, video_id: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let key = format!("{}{}", VIDEO_RECORD_PREFIX, video_id);
        conn.del::<_, ()>(&key).await?;
        Ok(())
    }
}
