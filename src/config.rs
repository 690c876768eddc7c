//! Runtime configuration
//!
//! Plain configuration struct with service defaults. Values are captured at
//! startup; the scheduler and cache snapshot their portions on first
//! construction and ignore later changes.

use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host address to bind to
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// Path to the ONNX segmentation model, relative to the working directory
    pub segmentation_model: PathBuf,

    /// Path to the source-separation worker script
    pub separation_script: PathBuf,

    /// External audio decoder binary (resample/downmix fallback)
    pub audio_tool: String,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: u64,

    /// Whole-request deadline, read through response. Set above the
    /// scheduler task timeout so it only catches stalled connections.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5730,
            segmentation_model: PathBuf::from("models/segmentation-3.0.onnx"),
            separation_script: PathBuf::from("scripts/sepformer-service.py"),
            audio_tool: "ffmpeg".to_string(),
            max_upload_bytes: 100 * 1024 * 1024,
            request_timeout_secs: 600,
        }
    }
}
