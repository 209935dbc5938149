use super::AppState;
use crate::application::upload::{ChunkOutcome, ChunkSubmission};
use crate::error::{AppError, Result};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::Json;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum UploadResponse {
    #[serde(rename_all = "camelCase")]
    Progress {
        complete: bool,
        session_id: String,
        uploaded_chunks: u32,
        total_chunks: u32,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        complete: bool,
        video_id: String,
        filename: String,
    },
}

impl From<ChunkOutcome> for UploadResponse {
    fn from(outcome: ChunkOutcome) -> Self {
        match outcome {
            ChunkOutcome::Progress {
                session_id,
                uploaded,
                total,
            } => UploadResponse::Progress {
                complete: false,
                session_id,
                uploaded_chunks: uploaded,
                total_chunks: total,
            },
            ChunkOutcome::Complete { video_id, filename } => UploadResponse::Complete {
                complete: true,
                video_id,
                filename,
            },
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::Input(format!("malformed multipart body: {}", e))
}

async fn read_bytes(field: Field<'_>) -> Result<Bytes> {
    let buffer = field
        .map_err(multipart_error)
        .try_fold(BytesMut::new(), |mut buffer, part| async move {
            buffer.extend_from_slice(&part);
            Ok(buffer)
        })
        .await?;
    Ok(buffer.freeze())
}

async fn read_text(field: Field<'_>) -> Result<String> {
    field.text().await.map_err(multipart_error)
}

fn parse_number(name: &str, value: Option<String>) -> Result<u32> {
    let value = value.ok_or_else(|| AppError::Input(format!("missing field {}", name)))?;
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Input(format!("{} must be a non-negative integer", name)))
}

/// One chunk of a multipart upload. Fields: `chunk` (bytes), `chunkIndex`,
/// `totalChunks`, `filename` and, after the first chunk, `sessionId`.
pub async fn upload_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut chunk = None;
    let mut chunk_name = None;
    let mut index = None;
    let mut total = None;
    let mut session_id = None;
    let mut filename = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "chunk" => {
                chunk_name = field.file_name().map(str::to_string);
                chunk = Some(read_bytes(field).await?);
            }
            "chunkIndex" => index = Some(read_text(field).await?),
            "totalChunks" => total = Some(read_text(field).await?),
            "sessionId" => session_id = Some(read_text(field).await?),
            "filename" => filename = Some(read_text(field).await?),
            _ => {}
        }
    }

    let submission = ChunkSubmission {
        session_id: session_id.filter(|id| !id.trim().is_empty()),
        index: parse_number("chunkIndex", index)?,
        total: parse_number("totalChunks", total)?,
        filename: filename
            .or(chunk_name)
            .ok_or_else(|| AppError::Input("missing field filename".to_string()))?,
        bytes: chunk.ok_or_else(|| AppError::Input("missing field chunk".to_string()))?,
    };

    let outcome = state.uploads.accept_chunk(submission).await?;
    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shapes() {
        let progress: UploadResponse = ChunkOutcome::Progress {
            session_id: "s1".into(),
            uploaded: 1,
            total: 3,
        }
        .into();
        assert_eq!(
            serde_json::to_value(progress).unwrap(),
            serde_json::json!({
                "complete": false,
                "sessionId": "s1",
                "uploadedChunks": 1,
                "totalChunks": 3
            })
        );

        let complete: UploadResponse = ChunkOutcome::Complete {
            video_id: "v1".into(),
            filename: "clip.mp4".into(),
        }
        .into();
        assert_eq!(
            serde_json::to_value(complete).unwrap(),
            serde_json::json!({ "complete": true, "videoId": "v1", "filename": "clip.mp4" })
        );
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("chunkIndex", Some(" 4 ".into())).unwrap(), 4);
        assert!(parse_number("chunkIndex", Some("-1".into())).is_err());
        assert!(parse_number("chunkIndex", None).is_err());
    }
}
