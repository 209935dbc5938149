use super::AppState;
use crate::application::publisher::{PublishedVideo, TranscodeRequest};
use crate::error::{AppError, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeBody {
    pub video_id: String,
    #[serde(default)]
    pub source_path: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Quality {
    pub name: String,
    pub resolution: String,
    pub bitrate: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TranscodeResponse {
    pub success: bool,
    pub url: String,
    pub qualities: Vec<Quality>,
}

impl From<PublishedVideo> for TranscodeResponse {
    fn from(published: PublishedVideo) -> Self {
        Self {
            success: true,
            url: published.url,
            qualities: published
                .qualities
                .into_iter()
                .map(|variant| Quality {
                    name: variant.name,
                    resolution: variant.resolution,
                    bitrate: variant.bandwidth,
                })
                .collect(),
        }
    }
}

/// Runs the job to completion and answers with the master playlist URL.
pub async fn start(
    State(state): State<AppState>,
    Json(body): Json<TranscodeBody>,
) -> Result<Json<TranscodeResponse>> {
    let published = state
        .publisher
        .publish(TranscodeRequest {
            video_id: body.video_id,
            source_path: body.source_path,
        })
        .await?;
    Ok(Json(published.into()))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<(StatusCode, Json<Value>)> {
    if state.publisher.cancel(&video_id) {
        Ok((StatusCode::ACCEPTED, Json(json!({ "cancelled": true }))))
    } else {
        Err(AppError::NotFound(format!(
            "no transcode in progress for {}",
            video_id
        )))
    }
}
