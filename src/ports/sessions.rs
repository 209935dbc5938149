use crate::domain::media::UploadSession;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Distinct chunks received so far against the declared total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub received: u32,
    pub total: u32,
}

impl ChunkProgress {
    pub fn is_complete(&self) -> bool {
        self.received == self.total
    }
}

/// Registry of in-flight chunked uploads.
///
/// Implementations serialize access per session only; two sessions never
/// contend with each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &UploadSession) -> Result<()>;

    async fn load(&self, session_id: &str) -> Result<Option<UploadSession>>;

    /// Add `index` to the received set and return the distinct count, as one
    /// atomic step. Re-recording an index is a no-op.
    async fn record_chunk(&self, session_id: &str, index: u32) -> Result<ChunkProgress>;

    /// Claim the right to finalize. Exactly one concurrent caller gets `true`.
    async fn claim_finalize(&self, session_id: &str) -> Result<bool>;

    /// Give the finalize claim back after a failed reassembly.
    async fn release_finalize(&self, session_id: &str) -> Result<()>;

    async fn remove(&self, session_id: &str) -> Result<()>;

    /// Drop sessions idle for longer than `max_idle` and return them.
    /// Stores that expire keys on their own return an empty list.
    async fn expire_idle(&self, max_idle: Duration) -> Result<Vec<UploadSession>>;
}
