use crate::domain::ladder::{QualityRung, SourceDimensions};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// External encode tool, one invocation per rung.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode `input` into `<output_dir>/playlist.m3u8` plus its segments.
    ///
    /// Dropping the returned future must terminate the underlying process.
    async fn encode_rung(&self, input: &str, rung: &QualityRung, output_dir: &Path) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    /// Dimensions of the first video stream of `input`.
    async fn probe(&self, input: &str) -> Result<SourceDimensions>;
}
