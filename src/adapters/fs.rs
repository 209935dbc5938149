use crate::error::{AppError, Result};
use crate::ports::storage::BlobStore;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Blob store backed by a directory that the HTTP layer serves as-is.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload_dir(&self, local_dir: &Path, prefix: &str) -> Result<()> {
        if !key_is_valid(prefix) {
            return Err(AppError::Input(format!("Invalid storage prefix {}", prefix)));
        }
        let target = self.root.join(prefix);
        if target.exists() {
            tokio::fs::remove_dir_all(&target).await?;
        }

        for file in list_files(local_dir).await? {
            let relative = file
                .strip_prefix(local_dir)
                .map_err(|e| AppError::Storage(e.to_string()))?;
            let destination = target.join(relative);
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&file, &destination).await?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

/// Every regular file under `dir`, depth first.
pub async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn key_is_valid(key: &str) -> bool {
    !key.is_empty()
        && Path::new(key)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upload_dir_copies_tree() {
        let source = tempdir().unwrap();
        let root = tempdir().unwrap();
        tokio::fs::create_dir_all(source.path().join("720p")).await.unwrap();
        tokio::fs::write(source.path().join("master.m3u8"), "#EXTM3U\n").await.unwrap();
        tokio::fs::write(source.path().join("720p/segment_000.ts"), b"ts").await.unwrap();

        let store = FsBlobStore::new(root.path(), "/media/");
        store.upload_dir(source.path(), "videos/abc").await.unwrap();

        let copied = root.path().join("videos/abc/720p/segment_000.ts");
        assert_eq!(tokio::fs::read(copied).await.unwrap(), b"ts");
        assert_eq!(
            store.public_url("videos/abc/master.m3u8"),
            "/media/videos/abc/master.m3u8"
        );
    }

    #[tokio::test]
    async fn test_upload_dir_rejects_traversal() {
        let source = tempdir().unwrap();
        let root = tempdir().unwrap();
        let store = FsBlobStore::new(root.path(), "/media");

        let result = store.upload_dir(source.path(), "../escape").await;
        assert!(matches!(result, Err(AppError::Input(_))));
    }
}
