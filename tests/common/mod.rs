#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use hlsforge::adapters::fs::FsBlobStore;
use hlsforge::adapters::http::{router, AppState, MediaMount};
use hlsforge::adapters::http_fetch::ReqwestFetcher;
use hlsforge::adapters::memory::{MemoryMetadataStore, MemorySessionStore};
use hlsforge::application::publisher::Publisher;
use hlsforge::application::relay::RelayService;
use hlsforge::application::transcoder::TranscodeOrchestrator;
use hlsforge::application::upload::UploadService;
use hlsforge::domain::ladder::{QualityRung, SourceDimensions};
use hlsforge::ports::encoder::{Encoder, Prober};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const RELAY: &str = "/api/hls-proxy";

/// Writes a two-segment rendition instead of running ffmpeg.
pub struct FakeEncoder;

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode_rung(&self, _input: &str, rung: &QualityRung, output_dir: &Path) -> hlsforge::Result<()> {
        let playlist = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n\
            #EXT-X-PLAYLIST-TYPE:VOD\n#EXTINF:6.0,\nsegment_000.ts\n#EXTINF:4.0,\nsegment_001.ts\n\
            #EXT-X-ENDLIST\n";
        tokio::fs::write(output_dir.join("playlist.m3u8"), playlist).await?;
        for segment in ["segment_000.ts", "segment_001.ts"] {
            tokio::fs::write(output_dir.join(segment), rung.name.as_bytes()).await?;
        }
        Ok(())
    }
}

pub struct FakeProber(pub SourceDimensions);

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, _input: &str) -> hlsforge::Result<SourceDimensions> {
        Ok(self.0)
    }
}

pub struct TestApp {
    pub app: Router,
    pub upload_dir: PathBuf,
    pub public_dir: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_relay_timeout(Duration::from_secs(5))
    }

    pub fn with_relay_timeout(relay_timeout: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().join("uploads");
        let public_dir = dir.path().join("public");

        let metadata = Arc::new(MemoryMetadataStore::new());
        let uploads = Arc::new(UploadService::new(
            Arc::new(MemorySessionStore::new()),
            metadata.clone(),
            &upload_dir,
        ));
        let orchestrator = Arc::new(TranscodeOrchestrator::new(
            Arc::new(FakeEncoder),
            Arc::new(FakeProber(SourceDimensions {
                width: 1280,
                height: 720,
            })),
            dir.path().join("hls"),
            Duration::from_secs(30),
        ));
        let publisher = Arc::new(Publisher::new(
            orchestrator,
            metadata,
            Arc::new(FsBlobStore::new(&public_dir, "/media")),
            2,
        ));
        let relay = Arc::new(RelayService::new(
            Arc::new(ReqwestFetcher::with_timeout(relay_timeout).unwrap()),
            RELAY,
        ));

        let app = router(
            AppState {
                uploads,
                publisher,
                relay,
            },
            Some(MediaMount {
                base_path: "/media".to_string(),
                dir: public_dir.clone(),
            }),
        );

        Self {
            app,
            upload_dir,
            public_dir,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
