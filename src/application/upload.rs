//! Chunked upload reassembly.
//!
//! Each chunk is written to its own part-file named by session and index, so
//! a retried chunk overwrites instead of duplicating. Once the distinct
//! received count reaches the declared total, exactly one request wins the
//! finalize claim and concatenates the parts in ascending index order.

use crate::domain::media::{SourceAsset, UploadSession, VideoRecord};
use crate::error::{AppError, Result};
use crate::ports::repository::MetadataStore;
use crate::ports::sessions::SessionStore;
use bytes::Bytes;
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Directory under the upload root holding per-session part-files.
const PARTS_DIR: &str = ".parts";

#[derive(Debug, Clone)]
pub struct ChunkSubmission {
    /// Absent on the first chunk of a new upload
    pub session_id: Option<String>,
    pub index: u32,
    pub total: u32,
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Progress {
        session_id: String,
        uploaded: u32,
        total: u32,
    },
    Complete {
        video_id: String,
        filename: String,
    },
}

pub struct UploadService {
    sessions: Arc<dyn SessionStore>,
    metadata: Arc<dyn MetadataStore>,
    upload_dir: PathBuf,
    metadata_ttl: Option<Duration>,
}

impl UploadService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        metadata: Arc<dyn MetadataStore>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sessions,
            metadata,
            upload_dir: upload_dir.into(),
            metadata_ttl: None,
        }
    }

    pub fn with_metadata_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.metadata_ttl = ttl;
        self
    }

    pub async fn accept_chunk(&self, chunk: ChunkSubmission) -> Result<ChunkOutcome> {
        if chunk.total == 0 {
            return Err(AppError::Input("totalChunks must be at least 1".to_string()));
        }
        if chunk.index >= chunk.total {
            return Err(AppError::Input(format!(
                "chunkIndex {} is out of range for {} chunks",
                chunk.index, chunk.total
            )));
        }

        let session = match chunk.session_id.as_deref() {
            None => self.open_session(&chunk).await?,
            Some(id) => self
                .sessions
                .load(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("upload session {}", id)))?,
        };

        if session.total_chunks != chunk.total {
            return Err(AppError::session_state(
                &session.id,
                format!(
                    "chunk {} declares {} chunks but the session was opened with {}",
                    chunk.index, chunk.total, session.total_chunks
                ),
            ));
        }

        write_part(&session.scratch_dir, chunk.index, &chunk.bytes).await?;
        let progress = self.sessions.record_chunk(&session.id, chunk.index).await?;
        debug!(
            session_id = %session.id,
            index = chunk.index,
            received = progress.received,
            total = progress.total,
            "Chunk stored"
        );

        if progress.is_complete() && self.sessions.claim_finalize(&session.id).await? {
            return self.finalize(&session).await;
        }

        Ok(ChunkOutcome::Progress {
            session_id: session.id,
            uploaded: progress.received,
            total: progress.total,
        })
    }

    async fn open_session(&self, chunk: &ChunkSubmission) -> Result<UploadSession> {
        let filename = sanitize_filename(&chunk.filename)?;
        let id = Uuid::new_v4().to_string();
        let session = UploadSession {
            scratch_dir: self.upload_dir.join(PARTS_DIR).join(&id),
            id,
            asset_id: Uuid::new_v4().to_string(),
            filename,
            total_chunks: chunk.total,
            received: BTreeSet::new(),
            created_at: Utc::now(),
        };
        fs::create_dir_all(&session.scratch_dir).await?;
        self.sessions.create(&session).await?;
        info!(
            session_id = %session.id,
            asset_id = %session.asset_id,
            total = session.total_chunks,
            "Upload session opened"
        );
        Ok(session)
    }

    async fn finalize(&self, session: &UploadSession) -> Result<ChunkOutcome> {
        let asset_dir = self.upload_dir.join(&session.asset_id);
        let final_path = asset_dir.join(&session.filename);

        let size = match concatenate_parts(session, &asset_dir, &final_path).await {
            Ok(size) => size,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Reassembly failed");
                let _ = fs::remove_file(&final_path).await;
                self.sessions.release_finalize(&session.id).await?;
                return Err(e);
            }
        };

        let source = SourceAsset {
            id: session.asset_id.clone(),
            filename: session.filename.clone(),
            path: final_path.clone(),
            size,
            content_type: SourceAsset::content_type_for(&session.filename).to_string(),
            created_at: Utc::now(),
        };
        let record = VideoRecord::uploaded(source);
        let registered = match self.metadata_ttl {
            Some(ttl) => self.metadata.set_with_expiry(&record, ttl).await,
            None => self.metadata.set(&record).await,
        };
        // Parts and session stay until the asset is registered, so the
        // client can retry its last chunk.
        if let Err(e) = registered {
            warn!(session_id = %session.id, error = %e, "Could not register reassembled upload");
            let _ = fs::remove_file(&final_path).await;
            self.sessions.release_finalize(&session.id).await?;
            return Err(e);
        }

        if let Err(e) = fs::remove_dir_all(&session.scratch_dir).await {
            warn!(session_id = %session.id, error = %e, "Could not remove part-files");
        }
        self.sessions.remove(&session.id).await?;

        info!(
            session_id = %session.id,
            video_id = %session.asset_id,
            size,
            "Upload reassembled"
        );
        Ok(ChunkOutcome::Complete {
            video_id: session.asset_id.clone(),
            filename: session.filename.clone(),
        })
    }

    /// Remove sessions and part-files untouched for longer than `max_idle`.
    /// Returns the number of part directories deleted.
    pub async fn sweep_abandoned(&self, max_idle: Duration) -> Result<usize> {
        for session in self.sessions.expire_idle(max_idle).await? {
            info!(session_id = %session.id, "Expired abandoned upload session");
        }

        let parts_root = self.upload_dir.join(PARTS_DIR);
        if !parts_root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = fs::read_dir(&parts_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let modified = entry.metadata().await?.modified()?;
            let idle = SystemTime::now()
                .duration_since(modified)
                .unwrap_or_default();
            if idle > max_idle {
                fs::remove_dir_all(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn part_path(scratch_dir: &Path, index: u32) -> PathBuf {
    scratch_dir.join(format!("{:06}.part", index))
}

/// Write via a temp file and rename, so a retried chunk replaces the
/// previous attempt atomically.
async fn write_part(scratch_dir: &Path, index: u32, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(scratch_dir).await?;
    let tmp = scratch_dir.join(format!("{:06}.{}.tmp", index, Uuid::new_v4()));
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, part_path(scratch_dir, index)).await?;
    Ok(())
}

async fn concatenate_parts(
    session: &UploadSession,
    asset_dir: &Path,
    final_path: &Path,
) -> Result<u64> {
    fs::create_dir_all(asset_dir).await?;
    let mut output = BufWriter::new(File::create(final_path).await?);
    let mut size = 0;

    for index in 0..session.total_chunks {
        let path = part_path(&session.scratch_dir, index);
        let mut part = File::open(&path).await.map_err(|e| {
            AppError::session_state(&session.id, format!("part {} unreadable: {}", index, e))
        })?;
        size += tokio::io::copy(&mut part, &mut output).await?;
    }

    output.flush().await?;
    Ok(size)
}

/// Accept a bare file name only.
fn sanitize_filename(name: &str) -> Result<String> {
    let name = name.trim();
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if !name.contains('\\') => {
            Ok(part.to_string_lossy().into_owned())
        }
        _ => Err(AppError::Input(format!("invalid filename {:?}", name))),
    }
}
