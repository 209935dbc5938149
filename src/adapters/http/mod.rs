//! HTTP inbound adapter.
//!
//! Routes:
//! - `POST   /api/upload`             chunked multipart upload
//! - `POST   /api/transcode`          run the transcode job for an asset
//! - `DELETE /api/transcode/:id`      cancel a running job
//! - `GET    /api/videos/:id`         asset status
//! - `GET    <relay path>?url=...`    playlist relay
//! - `GET    <public base>/...`       published renditions (filesystem store)

mod error;
mod relay;
mod transcode;
mod upload;
mod videos;

use crate::application::publisher::Publisher;
use crate::application::relay::RelayService;
use crate::application::upload::UploadService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Largest request body accepted, i.e. the largest chunk plus form overhead.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadService>,
    pub publisher: Arc<Publisher>,
    pub relay: Arc<RelayService>,
}

/// Where the filesystem blob store is served from, if at all.
#[derive(Debug, Clone)]
pub struct MediaMount {
    pub base_path: String,
    pub dir: PathBuf,
}

pub fn router(state: AppState, media: Option<MediaMount>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let relay_route = state.relay.route().to_string();
    let mut router = Router::new()
        .route("/api/upload", post(upload::upload_chunk))
        .route("/api/transcode", post(transcode::start))
        .route("/api/transcode/:id", delete(transcode::cancel))
        .route("/api/videos/:id", get(videos::show))
        .route(&relay_route, get(relay::relay_playlist))
        .with_state(state);

    if let Some(media) = media {
        router = router.nest_service(&media.base_path, ServeDir::new(media.dir));
    }

    router
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
