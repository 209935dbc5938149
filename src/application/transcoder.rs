use crate::domain::hls::{MasterPlaylist, RenditionPlaylist, VariantStream};
use crate::domain::ladder::plan;
use crate::error::{AppError, Result};
use crate::ports::encoder::{Encoder, Prober};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Everything a finished job wrote under its output directory.
#[derive(Debug, Clone)]
pub struct TranscodeReport {
    pub video_id: String,
    pub output_dir: PathBuf,
    pub variants: Vec<VariantStream>,
    pub renditions: Vec<RenditionPlaylist>,
}

/// Plans the quality ladder for a source and drives one encode per rung.
///
/// Output for `video_id` lands in `<output_root>/<video_id>/`, one directory
/// per rung plus `master.m3u8`. The master is written last, after every rung
/// succeeded; on any failure the whole directory is removed.
pub struct TranscodeOrchestrator {
    encoder: Arc<dyn Encoder>,
    prober: Arc<dyn Prober>,
    output_root: PathBuf,
    job_timeout: Duration,
}

impl TranscodeOrchestrator {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        prober: Arc<dyn Prober>,
        output_root: impl Into<PathBuf>,
        job_timeout: Duration,
    ) -> Self {
        Self {
            encoder,
            prober,
            output_root: output_root.into(),
            job_timeout,
        }
    }

    pub fn output_dir(&self, video_id: &str) -> PathBuf {
        self.output_root.join(video_id)
    }

    pub async fn transcode(
        &self,
        video_id: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<TranscodeReport> {
        if !is_safe_id(video_id) {
            return Err(AppError::Input(format!("invalid video id {:?}", video_id)));
        }
        let output_dir = self.output_dir(video_id);

        // Dropping the job future kills the running encoder process.
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(AppError::Cancelled(video_id.to_string())),
            res = tokio::time::timeout(self.job_timeout, self.run(video_id, input, &output_dir)) => {
                res.unwrap_or_else(|_| {
                    Err(AppError::JobTimeout {
                        video_id: video_id.to_string(),
                        budget: self.job_timeout,
                    })
                })
            }
        };

        if let Err(e) = &outcome {
            warn!(video_id, error = %e, "Transcode failed, discarding output");
            discard(&output_dir).await;
        }
        outcome
    }

    async fn run(&self, video_id: &str, input: &str, output_dir: &Path) -> Result<TranscodeReport> {
        let source = self.prober.probe(input).await?;
        let rungs = plan(source)?;
        info!(
            video_id,
            width = source.width,
            height = source.height,
            rungs = rungs.len(),
            "Planned quality ladder"
        );

        discard(output_dir).await;
        fs::create_dir_all(output_dir).await?;

        let mut renditions = Vec::with_capacity(rungs.len());
        let mut variants = Vec::with_capacity(rungs.len());
        for rung in &rungs {
            let rung_dir = output_dir.join(&rung.name);
            fs::create_dir_all(&rung_dir).await?;

            self.encoder.encode_rung(input, rung, &rung_dir).await?;

            let text = fs::read_to_string(rung_dir.join("playlist.m3u8"))
                .await
                .map_err(|e| AppError::encode(&rung.name, format!("no rendition playlist: {}", e)))?;
            let rendition = RenditionPlaylist::from_encoder_output(rung, &text)?;
            info!(
                video_id,
                rung = %rung.name,
                segments = rendition.segments.len(),
                "Rung encoded"
            );

            variants.push(VariantStream::for_rung(rung));
            renditions.push(rendition);
        }

        MasterPlaylist::new(variants.clone())
            .write_to(&output_dir.join(MASTER_PLAYLIST))
            .await?;

        Ok(TranscodeReport {
            video_id: video_id.to_string(),
            output_dir: output_dir.to_path_buf(),
            variants,
            renditions,
        })
    }
}

/// Ids become directory names and blob keys.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

async fn discard(dir: &Path) {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "Could not remove output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ladder::{QualityRung, SourceDimensions};
    use crate::ports::encoder::{MockEncoder, MockProber};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    const RENDITION: &str = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n\
        #EXT-X-PLAYLIST-TYPE:VOD\n#EXTINF:6.000000,\nsegment_000.ts\n\
        #EXTINF:2.500000,\nsegment_001.ts\n#EXT-X-ENDLIST\n";

    fn prober(width: u32, height: u32) -> MockProber {
        let mut prober = MockProber::new();
        prober
            .expect_probe()
            .returning(move |_| Ok(SourceDimensions { width, height }));
        prober
    }

    /// Encoder that writes a valid rendition and records the rung order.
    fn writing_encoder(seen: Arc<Mutex<Vec<String>>>) -> MockEncoder {
        let mut encoder = MockEncoder::new();
        encoder.expect_encode_rung().returning(move |_, rung, dir| {
            seen.lock().unwrap().push(rung.name.clone());
            std::fs::write(dir.join("playlist.m3u8"), RENDITION)?;
            Ok(())
        });
        encoder
    }

    fn orchestrator(encoder: impl Encoder + 'static, prober: MockProber, root: &Path) -> TranscodeOrchestrator {
        TranscodeOrchestrator::new(
            Arc::new(encoder),
            Arc::new(prober),
            root,
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_encodes_applicable_rungs_in_descending_order() {
        let dir = tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = orchestrator(writing_encoder(seen.clone()), prober(1280, 720), dir.path());

        let report = service
            .transcode("v1", "/src/in.mp4", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["720p", "480p", "360p"]);
        assert_eq!(report.variants.len(), 3);
        assert_eq!(report.variants[0].bandwidth, 2_928_000);
        assert_eq!(report.renditions[1].path, "480p/playlist.m3u8");
        assert_eq!(report.renditions[0].segments.len(), 2);
        assert!(report.renditions[0].end_list);

        let master = fs::read_to_string(dir.path().join("v1").join(MASTER_PLAYLIST))
            .await
            .unwrap();
        assert!(master.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(master.contains("BANDWIDTH=2928000,RESOLUTION=1280x720\n720p/playlist.m3u8"));
        assert!(!master.contains("1080p"));
    }

    #[tokio::test]
    async fn test_small_source_gets_a_single_native_rung() {
        let dir = tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = orchestrator(writing_encoder(seen.clone()), prober(426, 240), dir.path());

        let report = service
            .transcode("v2", "/src/in.mp4", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["240p"]);
        assert_eq!(report.variants[0].resolution, "426x240");
    }

    #[tokio::test]
    async fn test_rung_failure_aborts_job_and_discards_output() {
        let dir = tempdir().unwrap();
        let mut encoder = MockEncoder::new();
        encoder.expect_encode_rung().returning(|_, rung, out| {
            if rung.name == "480p" {
                return Err(AppError::encode(&rung.name, "Conversion failed!"));
            }
            std::fs::write(out.join("playlist.m3u8"), RENDITION)?;
            Ok(())
        });
        let service = orchestrator(encoder, prober(1920, 1080), dir.path());

        let err = service
            .transcode("v3", "/src/in.mp4", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            AppError::Encode { rung, diagnostic } => {
                assert_eq!(rung, "480p");
                assert_eq!(diagnostic, "Conversion failed!");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!dir.path().join("v3").exists());
    }

    #[tokio::test]
    async fn test_empty_rendition_is_an_encode_error() {
        let dir = tempdir().unwrap();
        let mut encoder = MockEncoder::new();
        encoder.expect_encode_rung().returning(|_, _, out| {
            std::fs::write(out.join("playlist.m3u8"), "#EXTM3U\n#EXT-X-ENDLIST\n")?;
            Ok(())
        });
        let service = orchestrator(encoder, prober(640, 360), dir.path());

        let err = service
            .transcode("v4", "/src/in.mp4", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Encode { ref rung, .. } if rung == "360p"));
        assert!(!dir.path().join("v4").exists());
    }

    #[tokio::test]
    async fn test_probe_failure_never_encodes() {
        let dir = tempdir().unwrap();
        let mut prober = MockProber::new();
        prober
            .expect_probe()
            .returning(|_| Err(AppError::Input("source has no video stream".to_string())));
        let mut encoder = MockEncoder::new();
        encoder.expect_encode_rung().times(0);
        let service = orchestrator(encoder, prober, dir.path());

        let err = service
            .transcode("v5", "/src/in.mp3", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
    }

    struct StallingEncoder;

    #[async_trait]
    impl Encoder for StallingEncoder {
        async fn encode_rung(&self, _: &str, _: &QualityRung, dir: &Path) -> Result<()> {
            std::fs::write(dir.join("segment_000.ts"), b"partial")?;
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_job_budget_is_enforced() {
        let dir = tempdir().unwrap();
        let service = TranscodeOrchestrator::new(
            Arc::new(StallingEncoder),
            Arc::new(prober(640, 360)),
            dir.path(),
            Duration::from_millis(50),
        );

        let err = service
            .transcode("v6", "/src/in.mp4", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::JobTimeout { .. }));
        assert!(!dir.path().join("v6").exists());
    }

    #[tokio::test]
    async fn test_cancellation_discards_partial_output() {
        let dir = tempdir().unwrap();
        let service = orchestrator(StallingEncoder, prober(640, 360), dir.path());
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = service.transcode("v7", "/src/in.mp4", &token).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled(_)));
        assert!(!dir.path().join("v7").exists());
    }

    #[tokio::test]
    async fn test_rejects_ids_that_escape_the_output_root() {
        let dir = tempdir().unwrap();
        let mut encoder = MockEncoder::new();
        encoder.expect_encode_rung().times(0);
        let service = orchestrator(encoder, MockProber::new(), dir.path());

        let err = service
            .transcode("../etc", "/src/in.mp4", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
    }
}
