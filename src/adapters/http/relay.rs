use super::AppState;
use crate::application::relay::{target_param, RelayOutcome};
use crate::error::{AppError, Result};
use axum::extract::{RawQuery, State};
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Redirect, Response};

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// The target is read from the raw query so an unencoded nested URL keeps
/// its own query string.
pub async fn relay_playlist(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let target = query
        .as_deref()
        .and_then(target_param)
        .ok_or_else(|| AppError::Input("missing url parameter".to_string()))?;

    let response = match state.relay.relay(&target).await? {
        RelayOutcome::Playlist(body) => (
            [
                (CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            ],
            body,
        )
            .into_response(),
        RelayOutcome::Redirect(location) => (
            [(CACHE_CONTROL, "no-cache")],
            Redirect::temporary(&location),
        )
            .into_response(),
    };
    Ok(response)
}
