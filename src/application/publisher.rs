use crate::application::transcoder::{TranscodeOrchestrator, MASTER_PLAYLIST};
use crate::domain::hls::VariantStream;
use crate::domain::media::VideoRecord;
use crate::error::{AppError, Result};
use crate::ports::repository::MetadataStore;
use crate::ports::storage::BlobStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub video_id: String,
    /// Overrides the uploaded source, e.g. a file already in remote storage
    pub source_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVideo {
    pub video_id: String,
    pub url: String,
    pub qualities: Vec<VariantStream>,
}

/// Drives a transcode job end to end: status transitions in the metadata
/// store, the encode itself, and the upload of the finished ladder.
pub struct Publisher {
    orchestrator: Arc<TranscodeOrchestrator>,
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    permits: Arc<Semaphore>,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
    metadata_ttl: Option<Duration>,
}

/// Removes the job from the in-flight map however the job ends.
struct JobSlot<'a> {
    in_flight: &'a Mutex<HashMap<String, CancellationToken>>,
    video_id: String,
}

impl Drop for JobSlot<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.video_id);
    }
}

impl Publisher {
    pub fn new(
        orchestrator: Arc<TranscodeOrchestrator>,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            orchestrator,
            metadata,
            blobs,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            in_flight: Mutex::new(HashMap::new()),
            metadata_ttl: None,
        }
    }

    pub fn with_metadata_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.metadata_ttl = ttl;
        self
    }

    pub async fn status(&self, video_id: &str) -> Result<VideoRecord> {
        self.metadata
            .get(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("video {}", video_id)))
    }

    /// Cancel the job running for `video_id`. Returns false when none runs.
    pub fn cancel(&self, video_id: &str) -> bool {
        match self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(video_id)
        {
            Some(token) => {
                info!(video_id, "Cancelling transcode");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn publish(&self, request: TranscodeRequest) -> Result<PublishedVideo> {
        let video_id = request.video_id.trim().to_string();
        if video_id.is_empty() {
            return Err(AppError::Input("videoId is required".to_string()));
        }

        let (_slot, token) = self.claim(&video_id)?;

        let existing = self.metadata.get(&video_id).await?;
        let input = match (request.source_path, existing.as_ref()) {
            (Some(path), _) if !path.trim().is_empty() => path,
            (_, Some(VideoRecord { source: Some(source), .. })) => {
                source.path.to_string_lossy().into_owned()
            }
            _ => return Err(AppError::NotFound(format!("source for video {}", video_id))),
        };
        let record = existing.unwrap_or_else(|| VideoRecord::external(&video_id));

        let _permit = tokio::select! {
            _ = token.cancelled() => return Err(AppError::Cancelled(video_id.clone())),
            permit = self.permits.acquire() => permit
                .map_err(|e| AppError::Storage(format!("job scheduler closed: {}", e)))?,
        };

        self.save(&record.clone().processing()).await?;
        info!(video_id = %video_id, input = %input, "Transcode started");

        match self.run(&video_id, &input, &token).await {
            Ok(published) => {
                self.save(&record.ready(published.url.clone(), published.qualities.clone()))
                    .await?;
                info!(video_id = %video_id, url = %published.url, "Transcode published");
                Ok(published)
            }
            Err(e) => {
                error!(video_id = %video_id, error = %e, "Transcode failed");
                if let Err(store_err) = self.save(&record.failed(e.to_string())).await {
                    warn!(video_id = %video_id, error = %store_err, "Could not record failure");
                }
                Err(e)
            }
        }
    }

    fn claim(&self, video_id: &str) -> Result<(JobSlot<'_>, CancellationToken)> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if in_flight.contains_key(video_id) {
            return Err(AppError::Conflict(format!(
                "video {} already has a transcode in progress",
                video_id
            )));
        }
        let token = CancellationToken::new();
        in_flight.insert(video_id.to_string(), token.clone());
        Ok((
            JobSlot {
                in_flight: &self.in_flight,
                video_id: video_id.to_string(),
            },
            token,
        ))
    }

    async fn run(&self, video_id: &str, input: &str, token: &CancellationToken) -> Result<PublishedVideo> {
        let report = self.orchestrator.transcode(video_id, input, token).await?;

        let prefix = format!("videos/{}", video_id);
        self.blobs.upload_dir(&report.output_dir, &prefix).await?;
        if let Err(e) = tokio::fs::remove_dir_all(&report.output_dir).await {
            warn!(video_id, error = %e, "Could not remove local rendition output");
        }

        Ok(PublishedVideo {
            video_id: video_id.to_string(),
            url: self.blobs.public_url(&format!("{}/{}", prefix, MASTER_PLAYLIST)),
            qualities: report.variants,
        })
    }

    async fn save(&self, record: &VideoRecord) -> Result<()> {
        match self.metadata_ttl {
            Some(ttl) => self.metadata.set_with_expiry(record, ttl).await,
            None => self.metadata.set(record).await,
        }
    }
}
