use super::ladder::QualityRung;
use crate::error::{AppError, Result};
use hls_m3u8::MediaPlaylist as HlsMediaPlaylist;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRef {
    pub duration: f64,
    pub uri: String,
}

/// Rendition playlist produced by one encode pass. Immutable once built.
#[derive(Debug, Clone)]
pub struct RenditionPlaylist {
    pub target_duration: u64,
    pub segments: Vec<SegmentRef>,
    /// Path relative to the master playlist
    pub path: String,
    pub end_list: bool,
}

impl RenditionPlaylist {
    /// Build from the playlist text the encoder wrote for `rung`.
    ///
    /// A playlist that does not parse, or lists no segments, is an encode
    /// failure of that rung.
    pub fn from_encoder_output(rung: &QualityRung, text: &str) -> Result<Self> {
        let parsed = HlsMediaPlaylist::try_from(text)
            .map_err(|e| AppError::encode(&rung.name, format!("invalid rendition playlist: {}", e)))?;

        let segments: Vec<SegmentRef> = parsed
            .segments
            .values()
            .map(|segment| SegmentRef {
                duration: segment.duration.duration().as_secs_f64(),
                uri: segment.uri().to_string(),
            })
            .collect();
        if segments.is_empty() {
            return Err(AppError::encode(&rung.name, "rendition playlist lists no segments"));
        }

        Ok(Self {
            target_duration: parsed.target_duration.as_secs(),
            segments,
            path: rung.playlist_path(),
            end_list: text.contains("#EXT-X-ENDLIST"),
        })
    }
}

/// Entry of the master playlist; also reported to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantStream {
    pub name: String,
    pub path: String,
    pub bandwidth: u64,
    pub resolution: String,
}

impl VariantStream {
    pub fn for_rung(rung: &QualityRung) -> Self {
        Self {
            name: rung.name.clone(),
            path: rung.playlist_path(),
            bandwidth: rung.bandwidth(),
            resolution: rung.resolution(),
        }
    }
}

pub struct MasterPlaylist {
    pub version: u8,
    pub variants: Vec<VariantStream>,
}

impl MasterPlaylist {
    pub fn new(variants: Vec<VariantStream>) -> Self {
        Self {
            version: 3,
            variants,
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!("#EXTM3U\n#EXT-X-VERSION:{}\n", self.version);
        for (i, variant) in self.variants.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}\n",
                variant.bandwidth, variant.resolution, variant.path
            ));
        }
        out
    }

    pub async fn write_to(&self, path: &Path) -> Result<()> {
        if self.variants.is_empty() {
            return Err(AppError::Input(
                "refusing to write a master playlist without variants".to_string(),
            ));
        }
        let mut file = File::create(path).await?;
        file.write_all(self.render().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ladder::applicable_rungs;
    use tokio::fs;

    #[tokio::test]
    async fn test_master_playlist_text() {
        let variants = applicable_rungs(720)
            .iter()
            .map(VariantStream::for_rung)
            .collect();
        let master = MasterPlaylist::new(variants);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.m3u8");
        master.write_to(&path).await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            content,
            "#EXTM3U\n#EXT-X-VERSION:3\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2928000,RESOLUTION=1280x720\n720p/playlist.m3u8\n\
             \n#EXT-X-STREAM-INF:BANDWIDTH=1528000,RESOLUTION=854x480\n480p/playlist.m3u8\n\
             \n#EXT-X-STREAM-INF:BANDWIDTH=896000,RESOLUTION=640x360\n360p/playlist.m3u8\n"
        );
    }

    #[tokio::test]
    async fn test_empty_master_is_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.m3u8");

        let result = MasterPlaylist::new(vec![]).write_to(&path).await;
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_rendition_from_encoder_output() {
        let rung = applicable_rungs(360).remove(0);
        let text = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n\
                    #EXT-X-PLAYLIST-TYPE:VOD\n#EXTINF:6.006000,\nsegment_000.ts\n\
                    #EXTINF:2.502500,\nsegment_001.ts\n#EXT-X-ENDLIST\n";

        let rendition = RenditionPlaylist::from_encoder_output(&rung, text).unwrap();
        assert_eq!(rendition.target_duration, 6);
        assert_eq!(rendition.path, "360p/playlist.m3u8");
        assert!(rendition.end_list);
        assert_eq!(rendition.segments.len(), 2);
        assert_eq!(rendition.segments[1].uri, "segment_001.ts");
        assert!((rendition.segments[1].duration - 2.5025).abs() < 1e-6);
    }

    #[test]
    fn test_rendition_without_segments_is_an_encode_error() {
        let rung = applicable_rungs(360).remove(0);
        let err = RenditionPlaylist::from_encoder_output(
            &rung,
            "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXT-X-ENDLIST\n",
        )
        .err()
        .unwrap();
        assert!(matches!(err, AppError::Encode { rung, .. } if rung == "360p"));
    }

    #[test]
    fn test_unparseable_rendition_is_an_encode_error() {
        let rung = applicable_rungs(360).remove(0);
        for text in ["", "segment_000.ts\n", "#EXTM3U\n#EXTINF:6.0,\nsegment_000.ts\n"] {
            let err = RenditionPlaylist::from_encoder_output(&rung, text).err().unwrap();
            assert!(matches!(err, AppError::Encode { rung, .. } if rung == "360p"), "{:?}", text);
        }
    }
}
