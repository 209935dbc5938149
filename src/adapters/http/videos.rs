use super::AppState;
use crate::domain::media::VideoRecord;
use crate::error::Result;
use axum::extract::{Path, State};
use axum::Json;

pub async fn show(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoRecord>> {
    Ok(Json(state.publisher.status(&video_id).await?))
}
