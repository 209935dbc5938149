use crate::domain::media::VideoRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value store holding one VideoRecord per asset id.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, video_id: &str) -> Result<Option<VideoRecord>>;

    async fn set(&self, record: &VideoRecord) -> Result<()>;

    async fn set_with_expiry(&self, record: &VideoRecord, ttl: Duration) -> Result<()>;

    async fn delete(&self, video_id: &str) -> Result<()>;
}
