mod common;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use common::{body_bytes, body_json, TestApp};
use serde_json::{json, Value};

const BOUNDARY: &str = "----hlsforge-test-boundary";

struct Chunk<'a> {
    session_id: Option<&'a str>,
    index: usize,
    total: usize,
    filename: &'a str,
    bytes: &'a [u8],
}

fn multipart_request(chunk: &Chunk<'_>) -> Request<Body> {
    let mut body = Vec::new();
    let mut text_field = |name: &str, value: &str| {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    };
    text_field("chunkIndex", &chunk.index.to_string());
    text_field("totalChunks", &chunk.total.to_string());
    text_field("filename", chunk.filename);
    if let Some(session_id) = chunk.session_id {
        text_field("sessionId", session_id);
    }

    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"chunk\"; filename=\"blob\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(chunk.bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Uploads `data` split into `size`-byte chunks, submitted in `order`.
async fn upload(test: &TestApp, data: &[u8], size: usize, order: &[usize]) -> Value {
    let parts: Vec<&[u8]> = data.chunks(size).collect();
    let mut session_id: Option<String> = None;
    let mut last = Value::Null;

    for &index in order {
        let response = test
            .send(multipart_request(&Chunk {
                session_id: session_id.as_deref(),
                index,
                total: parts.len(),
                filename: "movie.mp4",
                bytes: parts[index],
            }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        last = body_json(response).await;
        if let Some(id) = last["sessionId"].as_str() {
            session_id = Some(id.to_string());
        }
    }
    last
}

#[tokio::test]
async fn test_out_of_order_chunks_reassemble_byte_for_byte() {
    let test = TestApp::new();
    let data: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 256) as u8).collect();

    let first = test
        .send(multipart_request(&Chunk {
            session_id: None,
            index: 2,
            total: 3,
            filename: "movie.mp4",
            bytes: &data[2000..],
        }))
        .await;
    let first = body_json(first).await;
    assert_eq!(first["complete"], false);
    assert_eq!(first["uploadedChunks"], 1);
    assert_eq!(first["totalChunks"], 3);

    let done = upload(&test, &data, 1000, &[2, 0, 1]).await;
    assert_eq!(done["complete"], true);
    assert_eq!(done["filename"], "movie.mp4");

    let video_id = done["videoId"].as_str().unwrap();
    let assembled = std::fs::read(test.upload_dir.join(video_id).join("movie.mp4")).unwrap();
    assert_eq!(assembled, data);

    let record = body_json(test.send(get(&format!("/api/videos/{}", video_id))).await).await;
    assert_eq!(record["status"], "uploaded");
    assert_eq!(record["source"]["size"], 3000);
}

#[tokio::test]
async fn test_changed_total_is_a_conflict() {
    let test = TestApp::new();
    let first = body_json(
        test.send(multipart_request(&Chunk {
            session_id: None,
            index: 0,
            total: 3,
            filename: "movie.mp4",
            bytes: b"aaaa",
        }))
        .await,
    )
    .await;
    let session_id = first["sessionId"].as_str().unwrap();

    let response = test
        .send(multipart_request(&Chunk {
            session_id: Some(session_id),
            index: 1,
            total: 4,
            filename: "movie.mp4",
            bytes: b"bbbb",
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_bad_chunk_requests_are_rejected() {
    let test = TestApp::new();

    let out_of_range = test
        .send(multipart_request(&Chunk {
            session_id: None,
            index: 3,
            total: 3,
            filename: "movie.mp4",
            bytes: b"x",
        }))
        .await;
    assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);

    let unknown_session = test
        .send(multipart_request(&Chunk {
            session_id: Some("does-not-exist"),
            index: 0,
            total: 3,
            filename: "movie.mp4",
            bytes: b"x",
        }))
        .await;
    assert_eq!(unknown_session.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uploaded_asset_transcodes_and_is_served() {
    let test = TestApp::new();
    let done = upload(&test, &[1u8; 2500], 1000, &[0, 1, 2]).await;
    let video_id = done["videoId"].as_str().unwrap().to_string();

    let response = test
        .send(json_request(
            Method::POST,
            "/api/transcode",
            json!({ "videoId": video_id }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let published = body_json(response).await;
    let master_url = format!("/media/videos/{}/master.m3u8", video_id);
    assert_eq!(published["success"], true);
    assert_eq!(published["url"], master_url.as_str());
    assert_eq!(
        published["qualities"],
        json!([
            { "name": "720p", "resolution": "1280x720", "bitrate": 2_928_000 },
            { "name": "480p", "resolution": "854x480", "bitrate": 1_528_000 },
            { "name": "360p", "resolution": "640x360", "bitrate": 896_000 }
        ])
    );

    let master = test.send(get(&master_url)).await;
    assert_eq!(master.status(), StatusCode::OK);
    let master = String::from_utf8(body_bytes(master).await).unwrap();
    assert!(master.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));
    assert!(master.contains("RESOLUTION=854x480\n480p/playlist.m3u8\n"));

    let segment = test
        .send(get(&format!("/media/videos/{}/360p/segment_001.ts", video_id)))
        .await;
    assert_eq!(segment.status(), StatusCode::OK);

    let record = body_json(test.send(get(&format!("/api/videos/{}", video_id))).await).await;
    assert_eq!(record["status"], "ready");
    assert_eq!(record["url"], master_url.as_str());
}

#[tokio::test]
async fn test_transcode_of_unknown_asset_is_not_found() {
    let test = TestApp::new();

    let response = test
        .send(json_request(
            Method::POST,
            "/api/transcode",
            json!({ "videoId": "nope" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = test.send(get("/api/videos/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = test
        .send(
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/transcode/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
