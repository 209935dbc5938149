//! In-process stores for single-node deployments and tests.
//!
//! The session registry holds one mutex per session behind a map that is
//! only locked long enough to look an entry up, so chunks of different
//! sessions never wait on each other.

use crate::domain::media::{UploadSession, VideoRecord};
use crate::error::{AppError, Result};
use crate::ports::repository::MetadataStore;
use crate::ports::sessions::{ChunkProgress, SessionStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct SessionEntry {
    session: UploadSession,
    finalizing: bool,
    touched: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<SessionEntry>>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, session_id: &str) -> Option<Arc<Mutex<SessionEntry>>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    fn require(&self, session_id: &str) -> Result<Arc<Mutex<SessionEntry>>> {
        self.entry(session_id)
            .ok_or_else(|| AppError::NotFound(format!("upload session {}", session_id)))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &UploadSession) -> Result<()> {
        let entry = SessionEntry {
            session: session.clone(),
            finalizing: false,
            touched: Instant::now(),
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id.clone(), Arc::new(Mutex::new(entry)));
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<UploadSession>> {
        Ok(self.entry(session_id).map(|entry| {
            entry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .session
                .clone()
        }))
    }

    async fn record_chunk(&self, session_id: &str, index: u32) -> Result<ChunkProgress> {
        let entry = self.require(session_id)?;
        let mut entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
        entry.session.received.insert(index);
        entry.touched = Instant::now();
        Ok(ChunkProgress {
            received: entry.session.received.len() as u32,
            total: entry.session.total_chunks,
        })
    }

    async fn claim_finalize(&self, session_id: &str) -> Result<bool> {
        let entry = self.require(session_id)?;
        let mut entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
        if entry.finalizing || !entry.session.is_complete() {
            return Ok(false);
        }
        entry.finalizing = true;
        Ok(true)
    }

    async fn release_finalize(&self, session_id: &str) -> Result<()> {
        if let Some(entry) = self.entry(session_id) {
            entry.lock().unwrap_or_else(PoisonError::into_inner).finalizing = false;
        }
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<()> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        Ok(())
    }

    async fn expire_idle(&self, max_idle: Duration) -> Result<Vec<UploadSession>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut expired = Vec::new();
        sessions.retain(|_, entry| {
            let entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
            let idle = entry.touched.elapsed() > max_idle && !entry.finalizing;
            if idle {
                expired.push(entry.session.clone());
            }
            !idle
        });
        Ok(expired)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    records: Arc<RwLock<HashMap<String, (VideoRecord, Option<Instant>)>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, record: &VideoRecord, expires_at: Option<Instant>) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone(), (record.clone(), expires_at));
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, video_id: &str) -> Result<Option<VideoRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(video_id).and_then(|(record, expires_at)| {
            match expires_at {
                Some(deadline) if *deadline <= Instant::now() => None,
                _ => Some(record.clone()),
            }
        }))
    }

    async fn set(&self, record: &VideoRecord) -> Result<()> {
        self.insert(record, None);
        Ok(())
    }

    async fn set_with_expiry(&self, record: &VideoRecord, ttl: Duration) -> Result<()> {
        self.insert(record, Some(Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, video_id: &str) -> Result<()> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(video_id);
        Ok(())
    }
}
