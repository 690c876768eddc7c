//! Diarization pipeline
//!
//! Composes the stages between upload bytes and a `DiarizationResult`:
//! normalize to mono 16 kHz, run the segmentation model, post-process the
//! frame activations into speaker-labeled segments.

pub mod model;
pub mod postprocess;
pub mod types;

use crate::audio;
use crate::config::Config;
use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use types::DiarizationResult;

/// Run the full diarization pipeline over one upload.
///
/// Cancellation is observed between stages; inference itself runs to
/// completion once started (the model runtime has no abort hook) and the
/// result is discarded afterwards.
pub async fn run_pipeline(
    bytes: Vec<u8>,
    extension_hint: Option<String>,
    config: &Config,
    cancel: CancellationToken,
) -> Result<DiarizationResult> {
    let normalized = audio::normalize(
        &bytes,
        extension_hint.as_deref(),
        &config.audio_tool,
        &cancel,
    )
    .await?;
    let duration = normalized.duration();

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let model = model::segmentation_model(&config.segmentation_model)?;
    let activations = tokio::task::spawn_blocking(move || model.run(&normalized.samples))
        .await
        .map_err(|e| Error::InferenceFailure(format!("inference task failed: {}", e)))??;

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let segments = postprocess::activations_to_segments(&activations, duration);
    let result = postprocess::build_result(segments, duration);

    info!(
        duration_s = format!("{:.2}", duration),
        segments = result.segments.len(),
        speakers = result.total_speakers,
        "Diarization complete"
    );

    Ok(result)
}
