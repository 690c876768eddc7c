//! HTTP API tests
//!
//! Drives the router directly with tower's `oneshot`, covering the
//! validation boundary (missing fields, oversized uploads), error mapping,
//! and the health surface. Happy-path diarization needs the ONNX model on
//! disk and is exercised in deployment smoke tests instead.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use helpers::audio_generator::sine_wav;
use http_body_util::BodyExt;
use tower::util::ServiceExt;
use voxsplit::api::server::build_router;
use voxsplit::{AppState, Config};

const BOUNDARY: &str = "voxsplit-test-boundary";

fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::CONTENT_LENGTH, body.len().to_string())
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

#[tokio::test]
async fn test_health_reports_queue_and_uptime() {
    let app = build_router(AppState::new(Config::default()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["uptime"].is_u64());
    assert!(json["queue"]["capacity"].is_u64());
    assert!(json["queue"]["maxQueue"].is_u64());
    assert!(json["queue"]["available"].is_u64());
    assert!(json["memory"]["total"].is_u64());
}

#[tokio::test]
async fn test_diarization_missing_audio_field_is_400() {
    let app = build_router(AppState::new(Config::default()));

    let body = multipart_body(&[("comment", None, b"no audio here")]);
    let response = app
        .oneshot(multipart_request("/api/diarization", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("audio"));
}

#[tokio::test]
async fn test_oversized_upload_is_413_before_body_read() {
    let mut config = Config::default();
    config.max_upload_bytes = 1024;
    let app = build_router(AppState::new(config));

    // Declared length over the limit; the body itself is never consumed
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/diarization")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .header(header::CONTENT_LENGTH, "2048")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body_text(response).await.contains("error"));
}

#[tokio::test]
async fn test_corrupt_audio_maps_to_500_decode_failure() {
    let app = build_router(AppState::new(Config::default()));

    let body = multipart_body(&[(
        "audio",
        Some("renamed.wav"),
        b"definitely not a RIFF container",
    )]);
    let response = app
        .oneshot(multipart_request("/api/diarization", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("AudioDecodeFailure"));

    // The scheduler drains back to idle after the failure
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
    loop {
        let status = voxsplit::scheduler::scheduler().status();
        if status.active == 0 && status.pending == 0 {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "scheduler did not drain");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_valid_audio_without_model_maps_to_500_model_failure() {
    let mut config = Config::default();
    config.segmentation_model = "/nonexistent/models/segmentation.onnx".into();
    let app = build_router(AppState::new(config));

    let wav = sine_wav(16000, 1000, 440.0, 0.5);
    let body = multipart_body(&[("audio", Some("tone.wav"), &wav)]);
    let response = app
        .oneshot(multipart_request("/api/diarization", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("ModelLoadFailure"));
}

#[tokio::test]
async fn test_separate_missing_segments_is_400() {
    let app = build_router(AppState::new(Config::default()));

    let wav = sine_wav(16000, 500, 440.0, 0.5);
    let body = multipart_body(&[("audio", Some("tone.wav"), &wav)]);
    let response = app
        .oneshot(multipart_request("/api/separate", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("segments"));
}

#[tokio::test]
async fn test_separate_malformed_segments_json_is_400() {
    let app = build_router(AppState::new(Config::default()));

    let wav = sine_wav(16000, 500, 440.0, 0.5);
    let body = multipart_body(&[
        ("audio", Some("tone.wav"), &wav),
        ("segments", None, b"{not json"),
    ]);
    let response = app
        .oneshot(multipart_request("/api/separate", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("segments JSON"));
}

#[tokio::test]
async fn test_separate_bad_num_speakers_is_400() {
    let app = build_router(AppState::new(Config::default()));

    let wav = sine_wav(16000, 500, 440.0, 0.5);
    let body = multipart_body(&[
        ("audio", Some("tone.wav"), &wav),
        (
            "segments",
            None,
            br#"[{"startTime":0.0,"endTime":1.0,"speaker":0}]"#,
        ),
        ("numSpeakers", None, b"many"),
    ]);
    let response = app
        .oneshot(multipart_request("/api/separate", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("numSpeakers"));
}
