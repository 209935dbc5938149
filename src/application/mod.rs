//! Application layer - services composed from ports.

pub mod janitor;
pub mod publisher;
pub mod relay;
pub mod transcoder;
pub mod upload;
