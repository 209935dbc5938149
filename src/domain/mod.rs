//! Domain layer - Pure business logic.

// Quality ladder and rung planning
pub mod ladder;

// HLS playlists: line model, master and rendition playlists
pub mod hls;
pub mod m3u8;

// Assets, records and upload sessions
pub mod media;
