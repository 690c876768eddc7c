//! Separation pipeline
//!
//! Slices the original audio by diarization segment and routes each slice
//! through the external source-separation worker, producing one isolated
//! clip per segment packaged into a ZIP archive.
//!
//! At most one separation runs per process; a second attempt fails with
//! `Busy`. Every intermediate file is registered in a tracked set and
//! unlinked on every exit path.
//!
//! Known limitation carried from the separation model: it emits at most two
//! sources. Requests claiming more speakers are clamped to 2 and segments
//! rotate across the two output tracks by first-seen speaker index, so
//! speakers 3+ may be mislabeled.

pub mod archive;
pub mod tempfiles;
pub mod worker;

use crate::audio;
use crate::config::Config;
use crate::diarize::types::SegmentRequest;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfiles::{salted_path, TempFileSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The separation model emits at most this many sources.
const MAX_MODEL_SOURCES: usize = 2;

static PROCESSING: AtomicBool = AtomicBool::new(false);

/// Mutual-exclusion latch for the single in-flight separation.
struct ProcessingGuard;

impl ProcessingGuard {
    fn acquire() -> Result<Self> {
        PROCESSING
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(Self)
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        PROCESSING.store(false, Ordering::Release);
    }
}

/// One isolated clip, owning a temp file until cleanup
#[derive(Debug)]
struct SeparationOutput {
    speaker_position: usize,
    start_time: f64,
    end_time: f64,
    audio_path: PathBuf,
}

/// Run the separation pipeline and return the ZIP archive bytes.
pub async fn separate(
    bytes: Vec<u8>,
    segments: Vec<SegmentRequest>,
    num_speakers: Option<usize>,
    config: &Config,
    cancel: CancellationToken,
) -> Result<Vec<u8>> {
    if segments.is_empty() {
        return Err(Error::InputValidation("segments list is empty".to_string()));
    }
    for seg in &segments {
        if seg.end_time <= seg.start_time || seg.start_time < 0.0 {
            return Err(Error::InputValidation(format!(
                "invalid segment times {}..{}",
                seg.start_time, seg.end_time
            )));
        }
    }

    let _guard = ProcessingGuard::acquire()?;

    let temps = TempFileSet::new();
    let result = run_pipeline(bytes, segments, num_speakers, config, &cancel, &temps).await;

    // All exit paths drain the temp set before the error (or archive)
    // propagates; the latch releases when the guard drops.
    temps.cleanup_all();
    result
}

async fn run_pipeline(
    bytes: Vec<u8>,
    segments: Vec<SegmentRequest>,
    num_speakers: Option<usize>,
    config: &Config,
    cancel: &CancellationToken,
    temps: &TempFileSet,
) -> Result<Vec<u8>> {
    let normalized = audio::normalize(&bytes, None, &config.audio_tool, cancel).await?;

    // First-seen order of speaker indices decides display names and which
    // separated track each segment takes.
    let mut first_seen: Vec<usize> = Vec::new();
    for seg in &segments {
        let speaker = seg.speaker_index().ok_or_else(|| {
            Error::InputValidation(format!("unrecognized speaker label: {}", seg.speaker))
        })?;
        if !first_seen.contains(&speaker) {
            first_seen.push(speaker);
        }
    }

    let claimed = num_speakers.unwrap_or(first_seen.len()).max(1);
    let requested_sources = claimed.min(MAX_MODEL_SOURCES);
    info!(
        segments = segments.len(),
        speakers = first_seen.len(),
        requested_sources,
        "Separation started"
    );

    let mut outputs: Vec<SeparationOutput> = Vec::new();

    for seg in &segments {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let Some(speaker) = seg.speaker_index() else {
            continue;
        };
        let Some(position) = first_seen.iter().position(|&s| s == speaker) else {
            continue;
        };

        // Slice the normalized waveform to this segment's time window
        let rate = normalized.sample_rate as f64;
        let start_idx = ((seg.start_time * rate) as usize).min(normalized.samples.len());
        let end_idx = ((seg.end_time * rate) as usize).min(normalized.samples.len());
        if end_idx <= start_idx {
            debug!(
                start = seg.start_time,
                end = seg.end_time,
                "Segment outside audio bounds, skipping"
            );
            continue;
        }

        let slice_path = salted_path("voxsplit_slice", "wav");
        temps.track(&slice_path);
        audio::wav::write_mono(
            &slice_path,
            &normalized.samples[start_idx..end_idx],
            normalized.sample_rate,
        )?;

        let out_dir = salted_path("voxsplit_sep", "");
        temps.track(&out_dir);
        tokio::fs::create_dir_all(&out_dir).await?;

        let separated = worker::run_separation(
            &config.separation_script,
            &slice_path,
            &out_dir,
            requested_sources,
            cancel,
        )
        .await?;

        // Keep the track matching this speaker's first-seen position; with
        // more speakers than sources this rotates across the two tracks.
        let pick = position % separated.len();
        let clip_path = salted_path("voxsplit_clip", "wav");
        temps.track(&clip_path);
        tokio::fs::copy(&separated[pick], &clip_path).await?;

        // The slice and the worker's whole output directory are done with;
        // remove them now rather than at the end to bound disk usage.
        let _ = std::fs::remove_file(&slice_path);
        let _ = std::fs::remove_dir_all(&out_dir);
        temps.untrack(&slice_path);
        temps.untrack(&out_dir);

        outputs.push(SeparationOutput {
            speaker_position: position,
            start_time: seg.start_time,
            end_time: seg.end_time,
            audio_path: clip_path,
        });
    }

    if outputs.is_empty() {
        return Err(Error::InputValidation(
            "no segment overlapped the audio".to_string(),
        ));
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let entries: Vec<archive::ArchiveEntry> = outputs
        .iter()
        .map(|out| archive::ArchiveEntry {
            name: archive::entry_name(
                &format!("Speaker {}", out.speaker_position + 1),
                out.start_time,
                out.end_time,
            ),
            path: out.audio_path.clone(),
        })
        .collect();

    let zip_bytes = tokio::task::spawn_blocking(move || archive::build_zip(&entries))
        .await
        .map_err(|e| Error::Internal(format!("archive task failed: {}", e)))??;

    info!(
        clips = outputs.len(),
        zip_bytes = zip_bytes.len(),
        "Separation complete"
    );

    Ok(zip_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64, speaker: u64) -> SegmentRequest {
        serde_json::from_value(serde_json::json!({
            "startTime": start,
            "endTime": end,
            "speaker": speaker,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_segments_rejected() {
        let config = Config::default();
        let result = separate(
            vec![0u8; 16],
            Vec::new(),
            None,
            &config,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(Error::InputValidation(_))));
    }

    #[tokio::test]
    async fn test_inverted_segment_times_rejected() {
        let config = Config::default();
        let result = separate(
            vec![0u8; 16],
            vec![segment(5.0, 2.0, 0)],
            None,
            &config,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(Error::InputValidation(_))));
    }

    #[tokio::test]
    async fn test_busy_latch_excludes_overlap_and_releases() {
        // Single test for the latch lifecycle; the static is process-wide,
        // so splitting this across tests would race under the parallel
        // test runner.
        let guard = ProcessingGuard::acquire().unwrap();
        assert!(matches!(ProcessingGuard::acquire(), Err(Error::Busy)));

        let config = Config::default();
        let result = separate(
            vec![0u8; 16],
            vec![segment(0.0, 1.0, 0)],
            None,
            &config,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(Error::Busy)));

        drop(guard);
        assert!(ProcessingGuard::acquire().is_ok());
    }
}
