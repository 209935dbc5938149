use super::hls::VariantStream;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Uploaded,
    Processing,
    Ready,
    Failed,
}

/// Reassembled upload, registered once the last chunk lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAsset {
    pub id: String,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl SourceAsset {
    pub fn content_type_for(filename: &str) -> &'static str {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" | "m4v" => "video/mp4",
            "mov" => "video/quicktime",
            "webm" => "video/webm",
            "mkv" => "video/x-matroska",
            "avi" => "video/x-msvideo",
            "ts" => "video/mp2t",
            _ => "application/octet-stream",
        }
    }
}

/// Snapshot kept in the metadata store, keyed by asset id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceAsset>,
    /// Serving URL of the master playlist once ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub qualities: Vec<VariantStream>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    pub fn uploaded(source: SourceAsset) -> Self {
        let now = Utc::now();
        Self {
            id: source.id.clone(),
            status: ProcessingStatus::Uploaded,
            source: Some(source),
            url: None,
            qualities: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn processing(mut self) -> Self {
        self.status = ProcessingStatus::Processing;
        self.error = None;
        self.updated_at = Utc::now();
        self
    }

    pub fn ready(mut self, url: String, qualities: Vec<VariantStream>) -> Self {
        self.status = ProcessingStatus::Ready;
        self.url = Some(url);
        self.qualities = qualities;
        self.error = None;
        self.updated_at = Utc::now();
        self
    }

    pub fn failed(mut self, reason: String) -> Self {
        self.status = ProcessingStatus::Failed;
        self.error = Some(reason);
        self.updated_at = Utc::now();
        self
    }

    /// Record for an asset that lives outside this service.
    pub fn external(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            status: ProcessingStatus::Uploaded,
            source: None,
            url: None,
            qualities: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// State of one chunked upload. Lives until reassembly succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub id: String,
    pub asset_id: String,
    pub filename: String,
    pub total_chunks: u32,
    #[serde(default)]
    pub received: BTreeSet<u32>,
    pub scratch_dir: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn is_complete(&self) -> bool {
        self.received.len() == self.total_chunks as usize
    }
}
