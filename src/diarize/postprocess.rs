//! Frame-activation post-processing
//!
//! Converts the segmentation model's frame-level class activations into
//! speaker-labeled segments and per-speaker summaries. The frame step is
//! derived from the audio duration and the frame count the model actually
//! emitted; the frame count is never assumed.

use crate::diarize::types::{DiarizationResult, Segment, SpeakerSummary, SPEAKER_PALETTE};

/// Minimum probability for a speaker class to claim a frame; below this the
/// frame is non-speech.
const SPEECH_THRESHOLD: f32 = 0.3;

/// Candidate segments shorter than this are suppressed.
const MIN_SEGMENT_DURATION: f64 = 0.5;

/// Frame-level activations as emitted by the model: `num_frames` rows of
/// `num_classes` logits, class 0 = non-speech.
#[derive(Debug)]
pub struct Activations {
    pub data: Vec<f32>,
    pub num_frames: usize,
    pub num_classes: usize,
}

/// Numerically stabilized softmax over one frame of logits.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&x| x / sum).collect()
}

/// Active speaker for one frame: the speaker class with the highest
/// probability, provided it beats the threshold; otherwise non-speech.
fn frame_speaker(logits: &[f32]) -> Option<usize> {
    let probs = softmax(logits);
    let mut best = None;
    let mut best_prob = SPEECH_THRESHOLD;
    for (class, &prob) in probs.iter().enumerate().skip(1) {
        if prob > best_prob {
            best = Some(class - 1);
            best_prob = prob;
        }
    }
    best
}

/// Walk frames in order and emit segments at speaker transitions.
pub fn activations_to_segments(activations: &Activations, audio_duration: f64) -> Vec<Segment> {
    if activations.num_frames == 0 || activations.num_classes == 0 {
        return Vec::new();
    }

    let frame_step = audio_duration / activations.num_frames as f64;

    let mut segments = Vec::new();
    let mut current_speaker: Option<usize> = None;
    let mut segment_start = 0.0f64;

    let emit = |speaker: usize, start: f64, end: f64, out: &mut Vec<Segment>| {
        if end - start >= MIN_SEGMENT_DURATION {
            out.push(Segment {
                start_time: start,
                end_time: end,
                speaker,
            });
        }
    };

    for frame in 0..activations.num_frames {
        let offset = frame * activations.num_classes;
        let logits = &activations.data[offset..offset + activations.num_classes];
        let active = frame_speaker(logits);

        if active != current_speaker {
            let t = frame as f64 * frame_step;
            if let Some(speaker) = current_speaker {
                emit(speaker, segment_start, t, &mut segments);
            }
            if active.is_some() {
                segment_start = t;
            }
            current_speaker = active;
        }
    }

    // Close any open segment at end of stream
    if let Some(speaker) = current_speaker {
        emit(speaker, segment_start, audio_duration, &mut segments);
    }

    segments
}

/// Build per-speaker summaries in order of first appearance.
pub fn summarize_speakers(segments: &[Segment]) -> Vec<SpeakerSummary> {
    let mut order: Vec<usize> = Vec::new();
    for seg in segments {
        if !order.contains(&seg.speaker) {
            order.push(seg.speaker);
        }
    }

    order
        .iter()
        .enumerate()
        .map(|(idx, &speaker)| {
            let segment_count = segments.iter().filter(|s| s.speaker == speaker).count();
            let total_duration = segments
                .iter()
                .filter(|s| s.speaker == speaker)
                .map(Segment::duration)
                .sum();
            SpeakerSummary {
                id: speaker,
                display_name: format!("Speaker {}", idx + 1),
                segment_count,
                total_duration,
                display_color: SPEAKER_PALETTE[idx % SPEAKER_PALETTE.len()].to_string(),
            }
        })
        .collect()
}

/// Assemble the final result from segments and the audio duration.
pub fn build_result(segments: Vec<Segment>, duration: f64) -> DiarizationResult {
    let speakers = summarize_speakers(&segments);
    let total_speakers = speakers.len();
    DiarizationResult {
        segments,
        speakers,
        duration,
        total_speakers,
    }
}
