//! In-process audio decoder using symphonia
//!
//! Decodes an uploaded byte buffer into a mono f32 waveform at the source
//! sample rate. Multi-channel audio is downmixed by taking the arithmetic
//! mean of all channels, sample-wise.
//!
//! # Supported formats
//!
//! Per Cargo.toml symphonia features: WAV, FLAC, OGG/Vorbis (defaults) plus
//! MP3, AAC and MP4/M4A. Containers symphonia cannot probe fall through to
//! the external-tool path in `normalize`.

use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded mono audio at its native sample rate
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono samples in [-1, 1]
    pub samples: Vec<f32>,

    /// Native sample rate of the source
    pub sample_rate: u32,
}

/// Decode a byte buffer to mono f32.
///
/// `extension_hint` is the file extension (or subtype of the declared media
/// type) used to steer format probing; probing still inspects the content.
pub fn decode_to_mono(bytes: &[u8], extension_hint: Option<&str>) -> Result<DecodedAudio> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    // Probe format
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::AudioDecodeFailure(format!("unrecognized container: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::AudioDecodeFailure("no audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::AudioDecodeFailure("source sample rate unknown".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::AudioDecodeFailure(format!("unsupported codec: {}", e)))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break; // EOF
            }
            Err(e) => {
                return Err(Error::AudioDecodeFailure(format!(
                    "packet read failed: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Recoverable per-packet decode errors: skip the packet
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => {
                return Err(Error::AudioDecodeFailure(format!("decode failed: {}", e)));
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
        });
        buf.copy_interleaved_ref(decoded);

        // Mean downmix across channels
        let interleaved = buf.samples();
        if channels <= 1 {
            mono.extend_from_slice(interleaved);
        } else {
            mono.reserve(interleaved.len() / channels);
            for frame in interleaved.chunks_exact(channels) {
                let sum: f32 = frame.iter().sum();
                mono.push(sum / channels as f32);
            }
        }
    }

    Ok(DecodedAudio {
        samples: mono,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::io::Cursor;

    fn wav_bytes(channels: u16, sample_rate: u32, frames: &[Vec<i16>]) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for frame in frames {
                for &sample in frame {
                    writer.write_sample(sample).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono_wav() {
        let frames: Vec<Vec<i16>> = (0..100).map(|i| vec![(i * 100) as i16]).collect();
        let bytes = wav_bytes(1, 44100, &frames);

        let decoded = decode_to_mono(&bytes, Some("wav")).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.samples.len(), 100);
    }

    #[test]
    fn test_decode_stereo_downmixes_to_mean() {
        // Left channel at max, right at zero: mean is half amplitude
        let frames: Vec<Vec<i16>> = (0..50).map(|_| vec![i16::MAX, 0]).collect();
        let bytes = wav_bytes(2, 16000, &frames);

        let decoded = decode_to_mono(&bytes, Some("wav")).unwrap();
        assert_eq!(decoded.samples.len(), 50);
        for &sample in &decoded.samples {
            assert!((sample - 0.5).abs() < 0.01, "expected ~0.5, got {}", sample);
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_to_mono(b"this is not audio at all", Some("wav"));
        assert!(matches!(result, Err(Error::AudioDecodeFailure(_))));
    }

    #[test]
    fn test_decode_empty_buffer_fails() {
        let result = decode_to_mono(&[], None);
        assert!(result.is_err());
    }
}
