//! hlsforge - HLS ingest, transcode and playlist relay
//!
//! Hexagonal Architecture:
//! - domain/: Pure logic (quality ladder, M3U8 model, playlists, records)
//! - ports/: Trait definitions for every collaborator
//! - adapters/: Concrete implementations (memory, Redis, filesystem, S3,
//!   ffmpeg, HTTP fetch) and the axum inbound adapter
//! - application/: Services (upload reassembly, transcode, publish, relay)
//! - config: Environment configuration
//!
//! # Features
//! - `aws`: S3 blob store

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

pub use config::Config;
pub use error::{AppError, Result};
