//! Fixed adaptive-bitrate ladder and rung planning.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Target segment duration handed to the encoder, in seconds.
pub const SEGMENT_SECONDS: u32 = 6;

/// One quality level of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRung {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub video_kbps: u32,
    pub audio_kbps: u32,
}

impl QualityRung {
    fn fixed(name: &str, width: u32, height: u32, video_kbps: u32, audio_kbps: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            video_kbps,
            audio_kbps,
        }
    }

    /// Peak video rate passed as `-maxrate` (video bitrate x 1.07).
    pub fn max_kbps(&self) -> u32 {
        (self.video_kbps as f64 * 1.07).round() as u32
    }

    /// Rate-control buffer passed as `-bufsize` (max rate x 1.5).
    pub fn buffer_kbps(&self) -> u32 {
        (self.max_kbps() as f64 * 1.5).round() as u32
    }

    /// `BANDWIDTH` advertised in the master playlist, in bits per second.
    pub fn bandwidth(&self) -> u64 {
        (self.video_kbps as u64 + self.audio_kbps as u64) * 1000
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Rendition playlist path relative to the master playlist.
    pub fn playlist_path(&self) -> String {
        format!("{}/playlist.m3u8", self.name)
    }
}

/// The full ladder, highest rung first.
pub fn ladder() -> Vec<QualityRung> {
    vec![
        QualityRung::fixed("1080p", 1920, 1080, 5000, 192),
        QualityRung::fixed("720p", 1280, 720, 2800, 128),
        QualityRung::fixed("480p", 854, 480, 1400, 128),
        QualityRung::fixed("360p", 640, 360, 800, 96),
    ]
}

/// Probed dimensions of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDimensions {
    pub width: u32,
    pub height: u32,
}

/// Rungs whose height fits within the source, descending by height.
pub fn applicable_rungs(source_height: u32) -> Vec<QualityRung> {
    let mut rungs: Vec<QualityRung> = ladder()
        .into_iter()
        .filter(|rung| rung.height <= source_height)
        .collect();
    rungs.sort_by(|a, b| b.height.cmp(&a.height));
    rungs
}

/// Rungs to encode for a source.
///
/// A source shorter than the smallest rung gets a single rung at its own
/// (even-rounded) resolution carrying the smallest rung's bitrates, so a
/// successful job never publishes an empty master playlist.
pub fn plan(source: SourceDimensions) -> Result<Vec<QualityRung>> {
    let rungs = applicable_rungs(source.height);
    if !rungs.is_empty() {
        return Ok(rungs);
    }

    let height = source.height & !1;
    let width = source.width & !1;
    if height == 0 || width == 0 {
        return Err(AppError::Input(format!(
            "Source resolution {}x{} is too small to encode",
            source.width, source.height
        )));
    }

    let floor = ladder()
        .into_iter()
        .min_by_key(|rung| rung.height)
        .ok_or_else(|| AppError::Input("Quality ladder is empty".to_string()))?;

    Ok(vec![QualityRung {
        name: format!("{}p", height),
        width,
        height,
        video_kbps: floor.video_kbps,
        audio_kbps: floor.audio_kbps,
    }])
}
