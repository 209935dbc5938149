//! Monolith Binary - single-server deployment
//!
//! Wires up:
//! - Metadata and session stores (Redis when `REDIS_URL` is set, in-memory otherwise)
//! - Blob store (filesystem served under `PUBLIC_BASE_URL`, or S3 with feature `aws`)
//! - ffmpeg/ffprobe encoder, reqwest playlist fetcher
//! - HTTP inbound adapter and the abandoned-upload janitor

use hlsforge::adapters::ffmpeg::{FfmpegEncoder, FfprobeProber};
use hlsforge::adapters::fs::FsBlobStore;
use hlsforge::adapters::http::{router, AppState, MediaMount};
use hlsforge::adapters::http_fetch::ReqwestFetcher;
use hlsforge::adapters::memory::{MemoryMetadataStore, MemorySessionStore};
use hlsforge::adapters::redis::RedisPool;
use hlsforge::application::janitor;
use hlsforge::application::publisher::Publisher;
use hlsforge::application::relay::RelayService;
use hlsforge::application::transcoder::TranscodeOrchestrator;
use hlsforge::application::upload::UploadService;
use hlsforge::config::Config;
use hlsforge::ports::repository::MetadataStore;
use hlsforge::ports::sessions::SessionStore;
use hlsforge::ports::storage::BlobStore;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    if let Err(e) = run(config).await {
        error!(error = %e, "Server stopped");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> hlsforge::Result<()> {
    for dir in [&config.upload_dir, &config.output_dir, &config.public_dir] {
        tokio::fs::create_dir_all(dir).await?;
    }

    // 1. Stores
    let metadata: Arc<dyn MetadataStore>;
    let sessions: Arc<dyn SessionStore>;
    match &config.redis_url {
        Some(url) => {
            let redis = RedisPool::new(url, config.session_ttl)?;
            info!("Using Redis metadata and session stores");
            metadata = Arc::new(redis.clone());
            sessions = Arc::new(redis);
        }
        None => {
            info!("REDIS_URL not set, using in-memory stores");
            metadata = Arc::new(MemoryMetadataStore::new());
            sessions = Arc::new(MemorySessionStore::new());
        }
    }

    let (blobs, media) = blob_store(&config).await;

    // 2. Application services
    let uploads = Arc::new(
        UploadService::new(sessions, metadata.clone(), &config.upload_dir)
            .with_metadata_ttl(config.metadata_ttl),
    );
    let orchestrator = Arc::new(TranscodeOrchestrator::new(
        Arc::new(FfmpegEncoder::new(&config.ffmpeg_bin)),
        Arc::new(FfprobeProber::new(&config.ffprobe_bin)),
        &config.output_dir,
        config.job_timeout,
    ));
    let publisher = Arc::new(
        Publisher::new(orchestrator, metadata, blobs, config.max_concurrent_jobs)
            .with_metadata_ttl(config.metadata_ttl),
    );
    let relay = Arc::new(RelayService::new(
        Arc::new(ReqwestFetcher::with_timeout(config.relay_timeout)?),
        &config.relay_path,
    ));

    // 3. Background sweep of abandoned uploads
    janitor::spawn(uploads.clone(), config.session_ttl);

    // 4. HTTP layer
    let app = router(
        AppState {
            uploads,
            publisher,
            relay,
        },
        media,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(feature = "aws")]
async fn blob_store(config: &Config) -> (Arc<dyn BlobStore>, Option<MediaMount>) {
    use hlsforge::adapters::s3::S3Adapter;

    if let Some(bucket) = &config.s3_bucket {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&aws);
        info!(bucket = %bucket, "Publishing renditions to S3");
        let store = S3Adapter::new(client, bucket.clone(), config.public_base_url.clone());
        return (Arc::new(store), None);
    }
    filesystem_store(config)
}

#[cfg(not(feature = "aws"))]
async fn blob_store(config: &Config) -> (Arc<dyn BlobStore>, Option<MediaMount>) {
    filesystem_store(config)
}

fn filesystem_store(config: &Config) -> (Arc<dyn BlobStore>, Option<MediaMount>) {
    let store = FsBlobStore::new(&config.public_dir, &config.public_base_url);
    // An absolute base URL means something else serves the directory.
    let base_path = config.public_base_url.trim_end_matches('/');
    let media = (base_path.starts_with('/') && base_path.len() > 1).then(|| MediaMount {
        base_path: base_path.to_string(),
        dir: config.public_dir.clone(),
    });
    (Arc::new(store), media)
}
