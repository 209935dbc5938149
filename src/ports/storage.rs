use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Object storage that serves published renditions.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload every file under `local_dir`, keyed `<prefix>/<relative path>`.
    async fn upload_dir(&self, local_dir: &Path, prefix: &str) -> Result<()>;

    /// Public URL players use to fetch `key`.
    fn public_url(&self, key: &str) -> String;
}
