//! Ports - Trait definitions for every external collaborator.

pub mod encoder;
pub mod fetch;
pub mod repository;
pub mod sessions;
pub mod storage;
