//! Configuration loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Configuration for the monolith deployment.
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Redis connection URL. In-memory stores are used when unset.
    pub redis_url: Option<String>,
    /// Scratch space for part-files and reassembled uploads
    pub upload_dir: PathBuf,
    /// Local output root for rendition and master playlists
    pub output_dir: PathBuf,
    /// Root served to players by the filesystem blob store
    pub public_dir: PathBuf,
    /// URL prefix under which `public_dir` is reachable
    pub public_base_url: String,
    /// Path the playlist relay is mounted on
    pub relay_path: String,
    pub relay_timeout: Duration,
    /// Wall-clock budget for one whole transcode job
    pub job_timeout: Duration,
    pub max_concurrent_jobs: usize,
    /// Idle lifetime of an upload session before it is swept
    pub session_ttl: Duration,
    /// Expiry applied to video records, if any
    pub metadata_ttl: Option<Duration>,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    /// Bucket for the S3 blob store (feature `aws`)
    pub s3_bucket: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("3000")),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| String::from("./data/uploads"))
                .into(),
            output_dir: env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| String::from("./data/hls"))
                .into(),
            public_dir: env::var("PUBLIC_DIR")
                .unwrap_or_else(|_| String::from("./data/public"))
                .into(),
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| String::from("/media")),
            relay_path: env::var("RELAY_PATH").unwrap_or_else(|_| String::from("/api/hls-proxy")),
            relay_timeout: Duration::from_secs(parse_or("RELAY_TIMEOUT_SECS", 15)),
            job_timeout: Duration::from_secs(parse_or("JOB_TIMEOUT_SECS", 3600)),
            max_concurrent_jobs: parse_or("MAX_CONCURRENT_JOBS", 2usize).max(1),
            session_ttl: Duration::from_secs(parse_or("SESSION_TTL_SECS", 86_400)),
            metadata_ttl: env::var("METADATA_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
            ffmpeg_bin: env::var("FFMPEG_BIN").unwrap_or_else(|_| String::from("ffmpeg")),
            ffprobe_bin: env::var("FFPROBE_BIN").unwrap_or_else(|_| String::from("ffprobe")),
            s3_bucket: env::var("S3_BUCKET").ok(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Debug>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, ?default, "Invalid numeric setting, using default");
            default
        }),
        Err(_) => default,
    }
}
