use crate::error::{AppError, Result};
use crate::ports::fetch::{FetchedPlaylist, PlaylistFetcher};
use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

/// Playlists larger than this are not treated as playlists.
const MAX_PLAYLIST_BYTES: usize = 8 * 1024 * 1024;

/// Upstream fetcher using reqwest with a whole-request timeout.
#[derive(Clone, Debug)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Storage(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }

    fn map_error(url: &Url, error: reqwest::Error) -> AppError {
        if error.is_timeout() {
            AppError::UpstreamTimeout {
                url: url.to_string(),
            }
        } else {
            AppError::UpstreamUnreachable {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl PlaylistFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPlaylist> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let too_large = || AppError::NotAPlaylist {
            url: url.to_string(),
        };
        if response
            .content_length()
            .is_some_and(|length| length > MAX_PLAYLIST_BYTES as u64)
        {
            return Err(too_large());
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| Self::map_error(url, e))? {
            if body.len() + chunk.len() > MAX_PLAYLIST_BYTES {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedPlaylist {
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}
