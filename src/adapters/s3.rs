use super::fs::list_files;
use crate::error::{AppError, Result};
use crate::ports::storage::BlobStore;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

/// S3Adapter implements BlobStore for AWS S3.
#[derive(Clone)]
pub struct S3Adapter {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3Adapter {
    pub fn new(client: Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") | Some("m4s") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl BlobStore for S3Adapter {
    async fn upload_dir(&self, local_dir: &Path, prefix: &str) -> Result<()> {
        for file in list_files(local_dir).await? {
            let relative = file
                .strip_prefix(local_dir)
                .map_err(|e| AppError::Storage(e.to_string()))?;
            let key = format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                relative.to_string_lossy().replace('\\', "/")
            );
            let body = ByteStream::from_path(&file)
                .await
                .map_err(|e| AppError::Storage(format!("reading {}: {}", file.display(), e)))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type(content_type_for(&file))
                .body(body)
                .send()
                .await
                .map_err(|e| AppError::Storage(format!("uploading {}: {}", key, e)))?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}
