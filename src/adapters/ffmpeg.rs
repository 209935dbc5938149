//! `ffmpeg`/`ffprobe` subprocess adapters.

use crate::domain::ladder::{QualityRung, SourceDimensions, SEGMENT_SECONDS};
use crate::error::{AppError, Result};
use crate::ports::encoder::{Encoder, Prober};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Lines of encoder stderr kept in an EncodeError.
const DIAGNOSTIC_LINES: usize = 20;

#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    bin: String,
}

impl FfmpegEncoder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

/// Arguments for one rung: scale, bitrate pair, max rate, buffer size,
/// fixed segment duration and VOD playlist termination.
pub fn encode_args(input: &str, rung: &QualityRung, output_dir: &Path) -> Vec<String> {
    let segment_pattern = output_dir.join("segment_%03d.ts");
    let playlist = output_dir.join("playlist.m3u8");

    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string(),
        "-vf".to_string(),
        format!("scale={}:{}", rung.width, rung.height),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-b:v".to_string(),
        format!("{}k", rung.video_kbps),
        "-maxrate".to_string(),
        format!("{}k", rung.max_kbps()),
        "-bufsize".to_string(),
        format!("{}k", rung.buffer_kbps()),
        "-force_key_frames".to_string(),
        format!("expr:gte(t,n_forced*{})", SEGMENT_SECONDS),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", rung.audio_kbps),
        "-ac".to_string(),
        "2".to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        SEGMENT_SECONDS.to_string(),
        "-hls_playlist_type".to_string(),
        "vod".to_string(),
        "-hls_list_size".to_string(),
        "0".to_string(),
        "-hls_segment_filename".to_string(),
        segment_pattern.to_string_lossy().into_owned(),
        playlist.to_string_lossy().into_owned(),
    ]
}

fn tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode_rung(&self, input: &str, rung: &QualityRung, output_dir: &Path) -> Result<()> {
        let args = encode_args(input, rung, output_dir);
        debug!(rung = %rung.name, ?args, "Spawning encoder");

        let output = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::encode(&rung.name, format!("could not run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            let diagnostic = tail(&output.stderr);
            return Err(AppError::encode(
                &rung.name,
                if diagnostic.is_empty() {
                    format!("encoder exited with {}", output.status)
                } else {
                    diagnostic
                },
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct FfprobeProber {
    bin: String,
}

impl FfprobeProber {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

pub fn parse_probe(stdout: &[u8]) -> Result<SourceDimensions> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)?;
    probe
        .streams
        .into_iter()
        .find_map(|stream| match (stream.width, stream.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => {
                Some(SourceDimensions { width, height })
            }
            _ => None,
        })
        .ok_or_else(|| AppError::Input("source has no video stream".to_string()))
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, input: &str) -> Result<SourceDimensions> {
        let output = Command::new(&self.bin)
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-show_entries")
            .arg("stream=width,height")
            .arg("-of")
            .arg("json")
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(AppError::Input(format!(
                "ffprobe could not read {}: {}",
                input,
                tail(&output.stderr)
            )));
        }
        parse_probe(&output.stdout)
    }
}
