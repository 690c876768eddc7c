//! Error types for voxsplit
//!
//! Defines service-wide error kinds using thiserror and maps them onto HTTP
//! responses at the API boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Non-standard status used for client-aborted requests.
const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

/// Main error type for voxsplit
#[derive(Debug, Error)]
pub enum Error {
    /// Scheduler queue is at capacity; the work was never accepted
    #[error("Queue is full, try again later")]
    QueueFull,

    /// The request was cancelled before or during processing
    #[error("Request cancelled")]
    Cancelled,

    /// A running task exceeded its wall-time budget
    #[error("Task timed out")]
    Timeout,

    /// A queued task went stale before admission
    #[error("Task expired while waiting in queue")]
    Expired,

    /// Audio could not be decoded to a waveform
    #[error("AudioDecodeFailure: {0}")]
    AudioDecodeFailure(String),

    /// Decoding produced zero samples
    #[error("EmptyAudio: decoded waveform contains no samples")]
    EmptyAudio,

    /// The segmentation model could not be loaded
    #[error("ModelLoadFailure: {0}")]
    ModelLoadFailure(String),

    /// The segmentation model failed at inference time
    #[error("InferenceFailure: {0}")]
    InferenceFailure(String),

    /// The source-separation worker reported failure
    #[error("SeparationFailure: {0}")]
    SeparationFailure(String),

    /// A separation job is already in progress
    #[error("Separation already in progress")]
    Busy,

    /// Request validation failed at the HTTP boundary
    #[error("{0}")]
    InputValidation(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short machine-readable kind tag, used in lifecycle events and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::QueueFull => "QueueFull",
            Error::Cancelled => "Cancelled",
            Error::Timeout => "Timeout",
            Error::Expired => "Expired",
            Error::AudioDecodeFailure(_) => "AudioDecodeFailure",
            Error::EmptyAudio => "EmptyAudio",
            Error::ModelLoadFailure(_) => "ModelLoadFailure",
            Error::InferenceFailure(_) => "InferenceFailure",
            Error::SeparationFailure(_) => "SeparationFailure",
            Error::Busy => "Busy",
            Error::InputValidation(_) => "InputValidation",
            Error::Io(_) => "Io",
            Error::Internal(_) => "Internal",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            // Cancelled requests get the nginx-style 499 with no body; the
            // client is gone and must not receive a partial success payload.
            Error::Cancelled => {
                let status = StatusCode::from_u16(STATUS_CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                return status.into_response();
            }
            Error::QueueFull | Error::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Error::InputValidation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Convenience Result type using the voxsplit Error
pub type Result<T> = std::result::Result<T, Error>;
