use crate::error::Result;
use async_trait::async_trait;
use url::Url;

/// Successful (2xx) upstream response.
#[derive(Debug, Clone)]
pub struct FetchedPlaylist {
    pub content_type: Option<String>,
    pub body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    /// GET `url` with a bounded timeout.
    ///
    /// Non-success statuses map to `AppError::Upstream`, an elapsed timeout
    /// to `AppError::UpstreamTimeout`.
    async fn fetch(&self, url: &Url) -> Result<FetchedPlaylist>;
}
