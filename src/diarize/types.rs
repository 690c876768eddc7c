//! Diarization result types
//!
//! Internal segment/speaker types plus the JSON DTOs the API serves.
//! Segments are immutable once emitted; a `DiarizationResult` upholds the
//! ordering and minimum-duration invariants established by post-processing.

use serde::{Deserialize, Serialize};

/// Fixed display palette, assigned cyclically in order of first appearance.
pub const SPEAKER_PALETTE: [&str; 5] =
    ["#276b4d", "#518764", "#76a483", "#416e54", "#b8d6b6"];

/// A contiguous time interval attributed to a single speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds (>= 0)
    pub start_time: f64,

    /// End time in seconds (> start_time)
    pub end_time: f64,

    /// Zero-based speaker slot index
    pub speaker: usize,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Per-speaker summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSummary {
    /// Raw speaker slot index
    pub id: usize,

    /// "Speaker <k>" where k is the 1-based index of first appearance
    pub display_name: String,

    pub segment_count: usize,

    pub total_duration: f64,

    /// Palette color assigned by first appearance
    pub display_color: String,
}

/// Complete diarization output for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizationResult {
    /// Segments in non-decreasing start order, each >= 0.5 s
    pub segments: Vec<Segment>,

    /// Speakers in order of first appearance
    pub speakers: Vec<SpeakerSummary>,

    /// Total audio duration in seconds
    pub duration: f64,

    /// Number of distinct speaker ids across segments
    pub total_speakers: usize,
}

impl DiarizationResult {
    /// Display name for a raw speaker slot, falling back to the slot index
    /// for ids that never appeared in a segment.
    pub fn speaker_name(&self, speaker: usize) -> String {
        self.speakers
            .iter()
            .find(|s| s.id == speaker)
            .map(|s| s.display_name.clone())
            .unwrap_or_else(|| format!("Speaker {}", speaker + 1))
    }
}

// ============================================================================
// JSON DTOs (wire schema)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentJson {
    /// "<speaker>-<start>-<end>"
    pub id: String,

    /// Display name, e.g. "Speaker 1"
    pub speaker: String,

    pub start_time: f64,

    pub end_time: f64,

    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerJson {
    pub id: String,

    pub name: String,

    pub segment_count: usize,

    pub total_duration: f64,

    /// "#RRGGBB"
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiarizationResultJson {
    pub segments: Vec<SegmentJson>,

    pub speakers: Vec<SpeakerJson>,

    pub duration: f64,

    pub total_speakers: usize,

    pub method: String,
}

impl From<&DiarizationResult> for DiarizationResultJson {
    fn from(result: &DiarizationResult) -> Self {
        let segments = result
            .segments
            .iter()
            .map(|seg| SegmentJson {
                id: format!("{}-{}-{}", seg.speaker, seg.start_time, seg.end_time),
                speaker: result.speaker_name(seg.speaker),
                start_time: seg.start_time,
                end_time: seg.end_time,
                duration: seg.duration(),
            })
            .collect();

        let speakers = result
            .speakers
            .iter()
            .map(|spk| SpeakerJson {
                id: spk.id.to_string(),
                name: spk.display_name.clone(),
                segment_count: spk.segment_count,
                total_duration: spk.total_duration,
                color: spk.display_color.clone(),
            })
            .collect();

        Self {
            segments,
            speakers,
            duration: result.duration,
            total_speakers: result.total_speakers,
            method: "PyAnnote ONNX".to_string(),
        }
    }
}

/// Segments list as posted to the separation endpoint.
///
/// Accepts the same shape the diarization endpoint returns, so clients can
/// feed a response straight back in; only the timing fields and the speaker
/// label are consumed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRequest {
    pub start_time: f64,

    pub end_time: f64,

    /// Either a raw slot index ("0") or a display name ("Speaker 1")
    pub speaker: serde_json::Value,
}

impl SegmentRequest {
    /// Resolve the speaker field to a zero-based slot index.
    pub fn speaker_index(&self) -> Option<usize> {
        match &self.speaker {
            serde_json::Value::Number(n) => n.as_u64().map(|v| v as usize),
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(v) = trimmed.parse::<usize>() {
                    Some(v)
                } else {
                    // "Speaker k" display names are 1-based
                    trimmed
                        .strip_prefix("Speaker ")
                        .and_then(|k| k.trim().parse::<usize>().ok())
                        .and_then(|k| k.checked_sub(1))
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_speaker_result() -> DiarizationResult {
        DiarizationResult {
            segments: vec![
                Segment {
                    start_time: 0.0,
                    end_time: 7.4,
                    speaker: 1,
                },
                Segment {
                    start_time: 7.4,
                    end_time: 12.0,
                    speaker: 0,
                },
            ],
            speakers: vec![
                SpeakerSummary {
                    id: 1,
                    display_name: "Speaker 1".into(),
                    segment_count: 1,
                    total_duration: 7.4,
                    display_color: SPEAKER_PALETTE[0].into(),
                },
                SpeakerSummary {
                    id: 0,
                    display_name: "Speaker 2".into(),
                    segment_count: 1,
                    total_duration: 4.6,
                    display_color: SPEAKER_PALETTE[1].into(),
                },
            ],
            duration: 12.0,
            total_speakers: 2,
        }
    }

    #[test]
    fn test_segment_duration() {
        let seg = Segment {
            start_time: 1.5,
            end_time: 4.0,
            speaker: 0,
        };
        assert!((seg.duration() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_json_dto_shape() {
        let result = two_speaker_result();
        let json = DiarizationResultJson::from(&result);

        assert_eq!(json.method, "PyAnnote ONNX");
        assert_eq!(json.total_speakers, 2);
        assert_eq!(json.segments[0].id, "1-0-7.4");
        assert_eq!(json.segments[0].speaker, "Speaker 1");
        assert_eq!(json.segments[1].speaker, "Speaker 2");
        assert_eq!(json.speakers[0].color, "#276b4d");
        assert_eq!(json.speakers[1].color, "#518764");

        let serialized = serde_json::to_string(&json).unwrap();
        assert!(serialized.contains("\"startTime\""));
        assert!(serialized.contains("\"totalSpeakers\""));
        assert!(serialized.contains("\"segmentCount\""));
    }

    #[test]
    fn test_speaker_name_fallback() {
        let result = two_speaker_result();
        assert_eq!(result.speaker_name(1), "Speaker 1");
        assert_eq!(result.speaker_name(7), "Speaker 8");
    }

    #[test]
    fn test_segment_request_speaker_parsing() {
        let from_number: SegmentRequest =
            serde_json::from_str(r#"{"startTime":0,"endTime":1,"speaker":2}"#).unwrap();
        assert_eq!(from_number.speaker_index(), Some(2));

        let from_digit_string: SegmentRequest =
            serde_json::from_str(r#"{"startTime":0,"endTime":1,"speaker":"3"}"#).unwrap();
        assert_eq!(from_digit_string.speaker_index(), Some(3));

        let from_display_name: SegmentRequest =
            serde_json::from_str(r#"{"startTime":0,"endTime":1,"speaker":"Speaker 2"}"#).unwrap();
        assert_eq!(from_display_name.speaker_index(), Some(1));

        let invalid: SegmentRequest =
            serde_json::from_str(r#"{"startTime":0,"endTime":1,"speaker":"nobody"}"#).unwrap();
        assert_eq!(invalid.speaker_index(), None);
    }
}
