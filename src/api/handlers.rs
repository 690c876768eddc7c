//! HTTP request handlers
//!
//! Implements the REST endpoints: diarization upload, segment separation
//! export, and the health/status surface. Every upload handler derives a
//! cancellation token from the request lifetime, so a client abort
//! propagates through the scheduler to the pipeline and its subprocesses.

use crate::diarize::types::{DiarizationResultJson, SegmentRequest};
use crate::error::Error;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DiarizationResponse {
    success: bool,
    data: DiarizationResultJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueHealth {
    active: usize,
    pending: usize,
    capacity: usize,
    max_queue: usize,
    available: usize,
}

#[derive(Debug, Serialize)]
pub struct MemoryHealth {
    used: u64,
    total: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    uptime: u64,
    queue: QueueHealth,
    memory: MemoryHealth,
}

/// Decoded multipart upload
struct AudioUpload {
    bytes: Vec<u8>,
    extension_hint: Option<String>,
}

// ============================================================================
// Diarization Endpoint
// ============================================================================

/// POST /api/diarization
///
/// Multipart form with field `audio`. Returns the speaker-labeled segments,
/// serving identical re-uploads from the result cache.
pub async fn diarization(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Some(response) = reject_oversized(&headers, state.config.max_upload_bytes) {
        return response;
    }

    let mut upload: Option<AudioUpload> = None;
    if let Err(response) = read_fields(&mut multipart, &mut upload, None, None).await {
        return response;
    }
    let upload = match upload {
        Some(upload) => upload,
        None => {
            return Error::InputValidation("missing 'audio' field".to_string()).into_response();
        }
    };

    // Identical bytes within the TTL window skip the pipeline entirely
    if let Some(cached) = crate::cache::result_cache().get(&upload.bytes) {
        info!(bytes = upload.bytes.len(), "Serving diarization from cache");
        return Json(DiarizationResponse {
            success: true,
            data: DiarizationResultJson::from(&cached),
            cached: Some(true),
        })
        .into_response();
    }

    let job_id = Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    // Dropping the handler future (client abort) cancels the token and with
    // it the queued or running work.
    let _abort_guard = cancel.clone().drop_guard();

    info!(job_id = %job_id, bytes = upload.bytes.len(), "Diarization request accepted");

    let work_bytes = upload.bytes.clone();
    let work_hint = upload.extension_hint.clone();
    let work_config = state.config.clone();
    let work_cancel = cancel.clone();
    let outcome = crate::scheduler::scheduler()
        .enqueue(job_id.clone(), cancel, async move {
            crate::diarize::run_pipeline(work_bytes, work_hint, &work_config, work_cancel).await
        })
        .await;

    match outcome {
        Ok(result) => {
            crate::cache::result_cache().set(&upload.bytes, result.clone());
            Json(DiarizationResponse {
                success: true,
                data: DiarizationResultJson::from(&result),
                cached: None,
            })
            .into_response()
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Diarization failed");
            e.into_response()
        }
    }
}

// ============================================================================
// Separation Endpoint
// ============================================================================

/// POST /api/separate
///
/// Multipart form with fields `audio`, `segments` (JSON text) and optional
/// `numSpeakers`. Returns a ZIP of per-segment isolated clips.
pub async fn separate(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Some(response) = reject_oversized(&headers, state.config.max_upload_bytes) {
        return response;
    }

    let mut upload: Option<AudioUpload> = None;
    let mut segments_text: Option<String> = None;
    let mut num_speakers_text: Option<String> = None;
    if let Err(response) = read_fields(
        &mut multipart,
        &mut upload,
        Some(&mut segments_text),
        Some(&mut num_speakers_text),
    )
    .await
    {
        return response;
    }

    let upload = match upload {
        Some(upload) => upload,
        None => {
            return Error::InputValidation("missing 'audio' field".to_string()).into_response();
        }
    };
    let segments_text = match segments_text {
        Some(text) => text,
        None => {
            return Error::InputValidation("missing 'segments' field".to_string())
                .into_response();
        }
    };

    let segments: Vec<SegmentRequest> = match serde_json::from_str(&segments_text) {
        Ok(segments) => segments,
        Err(e) => {
            return Error::InputValidation(format!("invalid segments JSON: {}", e))
                .into_response();
        }
    };

    let num_speakers = match num_speakers_text.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => match text.parse::<usize>() {
            Ok(n) => Some(n),
            Err(_) => {
                return Error::InputValidation(format!(
                    "invalid numSpeakers value: {}",
                    text
                ))
                .into_response();
            }
        },
    };

    let job_id = Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    let _abort_guard = cancel.clone().drop_guard();

    info!(
        job_id = %job_id,
        segments = segments.len(),
        num_speakers = ?num_speakers,
        "Separation request accepted"
    );

    let work_config = state.config.clone();
    let work_cancel = cancel.clone();
    let outcome = crate::scheduler::scheduler()
        .enqueue(job_id.clone(), cancel, async move {
            crate::separate::separate(
                upload.bytes,
                segments,
                num_speakers,
                &work_config,
                work_cancel,
            )
            .await
        })
        .await;

    match outcome {
        Ok(zip_bytes) => {
            let filename = format!(
                "separated-speakers-{}.zip",
                chrono::Utc::now().timestamp_millis()
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                zip_bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Separation failed");
            e.into_response()
        }
    }
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = crate::scheduler::scheduler().status();
    let (used, total) = read_memory();

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: state.uptime_seconds(),
        queue: QueueHealth {
            active: status.active,
            pending: status.pending,
            capacity: status.max_concurrent,
            max_queue: status.max_queue_size,
            available: status.max_queue_size.saturating_sub(status.pending),
        },
        memory: MemoryHealth { used, total },
    })
}

/// Read (used, total) memory in bytes.
///
/// Linux reads /proc/meminfo; other platforms report zeros.
fn read_memory() -> (u64, u64) {
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = std::fs::read_to_string("/proc/meminfo") {
            let field = |name: &str| -> Option<u64> {
                content
                    .lines()
                    .find(|line| line.starts_with(name))
                    .and_then(|line| line.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<u64>().ok())
                    .map(|kb| kb * 1024)
            };
            if let (Some(total), Some(available)) = (field("MemTotal:"), field("MemAvailable:"))
            {
                return (total.saturating_sub(available), total);
            }
        }
    }
    (0, 0)
}

// ============================================================================
// Multipart plumbing
// ============================================================================

/// Enforce the upload cap from Content-Length before touching the body.
fn reject_oversized(headers: &HeaderMap, max_bytes: u64) -> Option<Response> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())?;

    if declared > max_bytes {
        warn!(declared, max_bytes, "Rejecting oversized upload");
        let body = Json(json!({
            "error": format!(
                "request of {} bytes exceeds the {} MiB limit",
                declared,
                max_bytes / (1024 * 1024)
            )
        }));
        return Some((StatusCode::PAYLOAD_TOO_LARGE, body).into_response());
    }
    None
}

/// Pull the known fields out of a multipart form.
async fn read_fields(
    multipart: &mut Multipart,
    upload: &mut Option<AudioUpload>,
    mut segments: Option<&mut Option<String>>,
    mut num_speakers: Option<&mut Option<String>>,
) -> std::result::Result<(), Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(()),
            Err(e) => {
                return Err(
                    Error::InputValidation(format!("malformed multipart body: {}", e))
                        .into_response(),
                );
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let extension_hint = extension_hint(
                    field.file_name().map(str::to_string),
                    field.content_type().map(str::to_string),
                );
                let bytes = field.bytes().await.map_err(|e| {
                    Error::InputValidation(format!("failed to read 'audio' field: {}", e))
                        .into_response()
                })?;
                *upload = Some(AudioUpload {
                    bytes: bytes.to_vec(),
                    extension_hint,
                });
            }
            "segments" => {
                if let Some(slot) = segments.as_deref_mut() {
                    let text = field.text().await.map_err(|e| {
                        Error::InputValidation(format!("failed to read 'segments' field: {}", e))
                            .into_response()
                    })?;
                    *slot = Some(text);
                }
            }
            "numSpeakers" => {
                if let Some(slot) = num_speakers.as_deref_mut() {
                    let text = field.text().await.map_err(|e| {
                        Error::InputValidation(format!(
                            "failed to read 'numSpeakers' field: {}",
                            e
                        ))
                        .into_response()
                    })?;
                    *slot = Some(text);
                }
            }
            other => {
                // Unknown fields are skipped, not rejected
                warn!(field = other, "Ignoring unknown multipart field");
            }
        }
    }
}

/// Derive a format hint from the uploaded file name or declared media type.
fn extension_hint(file_name: Option<String>, content_type: Option<String>) -> Option<String> {
    if let Some(name) = file_name {
        if let Some(ext) = std::path::Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
        {
            return Some(ext.to_ascii_lowercase());
        }
    }
    content_type
        .as_deref()
        .and_then(|ct| ct.split('/').nth(1))
        .map(|subtype| subtype.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_hint_prefers_file_name() {
        let hint = extension_hint(Some("Meeting.WAV".into()), Some("audio/mpeg".into()));
        assert_eq!(hint.as_deref(), Some("wav"));
    }

    #[test]
    fn test_extension_hint_falls_back_to_media_type() {
        let hint = extension_hint(None, Some("audio/mpeg".into()));
        assert_eq!(hint.as_deref(), Some("mpeg"));

        let hint = extension_hint(Some("noextension".into()), Some("audio/flac".into()));
        assert_eq!(hint.as_deref(), Some("flac"));
    }

    #[test]
    fn test_reject_oversized_uses_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "200".parse().unwrap());
        let response = reject_oversized(&headers, 100).unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_exact_limit_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "100".parse().unwrap());
        assert!(reject_oversized(&headers, 100).is_none());
    }

    #[test]
    fn test_missing_content_length_is_accepted() {
        // Absent header: the body-limit layer still enforces during read
        let headers = HeaderMap::new();
        assert!(reject_oversized(&headers, 100).is_none());
    }
}
