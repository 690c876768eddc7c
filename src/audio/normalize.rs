//! Audio normalization front door
//!
//! Turns an arbitrary-format upload into the mono 16 kHz f32 waveform in
//! [-1, 1] that the segmentation model requires. The in-process path
//! (symphonia decode + mean downmix + linear resample) handles the formats
//! the build enables; anything else is written to a temp file and pushed
//! through the external audio tool with arguments equivalent to
//! `-i IN -ar 16000 -ac 1 OUT -y`.

use crate::audio::{decode, resample::Resampler, wav, TARGET_SAMPLE_RATE};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Mono 16 kHz waveform ready for inference
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    /// Mono samples in [-1, 1]
    pub samples: Vec<f32>,

    /// Always `TARGET_SAMPLE_RATE`
    pub sample_rate: u32,
}

impl NormalizedAudio {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Normalize upload bytes to mono 16 kHz.
///
/// Tries the in-process decoder first and falls back to the external tool;
/// a failure of both is an `AudioDecodeFailure`. A decode that yields zero
/// samples fails with `EmptyAudio`.
pub async fn normalize(
    bytes: &[u8],
    extension_hint: Option<&str>,
    audio_tool: &str,
    cancel: &CancellationToken,
) -> Result<NormalizedAudio> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // In-process path: decode + downmix + resample off the async runtime.
    let owned_bytes = bytes.to_vec();
    let hint = extension_hint.map(str::to_string);
    let in_process = tokio::task::spawn_blocking(move || {
        decode::decode_to_mono(&owned_bytes, hint.as_deref()).map(|decoded| {
            let samples = Resampler::resample(&decoded.samples, decoded.sample_rate);
            NormalizedAudio {
                samples,
                sample_rate: TARGET_SAMPLE_RATE,
            }
        })
    })
    .await
    .map_err(|e| Error::Internal(format!("decode task failed: {}", e)))?;

    let normalized = match in_process {
        Ok(audio) => audio,
        Err(e) => {
            debug!(error = %e, "In-process decode failed, invoking external tool");
            decode_with_tool(bytes, audio_tool, cancel).await?
        }
    };

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if normalized.samples.is_empty() {
        return Err(Error::EmptyAudio);
    }

    Ok(normalized)
}

/// Canonical fallback: round-trip the bytes through the external audio tool.
async fn decode_with_tool(
    bytes: &[u8],
    audio_tool: &str,
    cancel: &CancellationToken,
) -> Result<NormalizedAudio> {
    let salt = uuid::Uuid::new_v4();
    let input_path = std::env::temp_dir().join(format!("voxsplit_in_{}", salt));
    let output_path = std::env::temp_dir().join(format!("voxsplit_norm_{}.wav", salt));

    tokio::fs::write(&input_path, bytes).await?;

    let result = run_tool(audio_tool, &input_path, &output_path, cancel).await;

    // Both intermediates are removed on every exit path; failures here are
    // logged and do not change the outcome.
    let cleanup = |path: &PathBuf| {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove temp file");
            }
        }
    };

    let normalized = match result {
        Ok(()) => read_normalized(&output_path),
        Err(e) => Err(e),
    };

    cleanup(&input_path);
    cleanup(&output_path);

    normalized
}

async fn run_tool(
    audio_tool: &str,
    input: &Path,
    output: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    debug!(
        tool = audio_tool,
        input = %input.display(),
        output = %output.display(),
        "Running external audio tool"
    );

    let mut child = Command::new(audio_tool)
        .arg("-i")
        .arg(input)
        .arg("-ar")
        .arg(TARGET_SAMPLE_RATE.to_string())
        .arg("-ac")
        .arg("1")
        .arg(output)
        .arg("-y")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::AudioDecodeFailure(format!("cannot launch {}: {}", audio_tool, e)))?;

    let output_result = tokio::select! {
        res = child.wait_with_output() => res,
        _ = cancel.cancelled() => {
            // kill_on_drop reaps the child when the future is dropped
            return Err(Error::Cancelled);
        }
    };

    let output_result =
        output_result.map_err(|e| Error::AudioDecodeFailure(format!("{} failed: {}", audio_tool, e)))?;

    if !output_result.status.success() {
        let stderr = String::from_utf8_lossy(&output_result.stderr);
        let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join("; ");
        return Err(Error::AudioDecodeFailure(format!(
            "{} exited with {:?}: {}",
            audio_tool,
            output_result.status.code(),
            tail
        )));
    }

    Ok(())
}

fn read_normalized(path: &Path) -> Result<NormalizedAudio> {
    let (samples, rate) = wav::read_mono(path)?;

    // The tool was asked for 16 kHz; resample defensively if it disagreed.
    let samples = if rate == TARGET_SAMPLE_RATE {
        samples
    } else {
        Resampler::resample(&samples, rate)
    };

    Ok(NormalizedAudio {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
    })
}
