//! Adapters - concrete implementations of ports, plus the HTTP inbound side.

pub mod ffmpeg;
pub mod fs;
pub mod http;
pub mod http_fetch;
pub mod memory;
pub mod redis;

#[cfg(feature = "aws")]
pub mod s3;
