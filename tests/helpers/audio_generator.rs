//! Audio test fixture generation
//!
//! Deterministic WAV buffers with known characteristics for exercising the
//! normalization path without shipping binary fixtures: silence, sine
//! tones, and alternating-band "conversations".

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

/// Generate an in-memory mono 16-bit WAV of a sine tone.
pub fn sine_wav(sample_rate: u32, duration_ms: u64, frequency_hz: f32, amplitude: f32) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        let total_frames = sample_rate as u64 * duration_ms / 1000;
        let amplitude_i16 = (amplitude * i16::MAX as f32) as f32;

        for frame_idx in 0..total_frames {
            let t = frame_idx as f32 / sample_rate as f32;
            let sample = (2.0 * PI * frequency_hz * t).sin() * amplitude_i16;
            writer.write_sample(sample as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Generate an in-memory stereo WAV with independent left/right tones.
pub fn stereo_wav(
    sample_rate: u32,
    duration_ms: u64,
    left_freq_hz: f32,
    right_freq_hz: f32,
) -> Vec<u8> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        let total_frames = sample_rate as u64 * duration_ms / 1000;
        let amplitude = 0.5 * i16::MAX as f32;

        for frame_idx in 0..total_frames {
            let t = frame_idx as f32 / sample_rate as f32;
            let left = (2.0 * PI * left_freq_hz * t).sin() * amplitude;
            let right = (2.0 * PI * right_freq_hz * t).sin() * amplitude;
            writer.write_sample(left as i16).unwrap();
            writer.write_sample(right as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Generate an in-memory mono WAV of silence.
pub fn silent_wav(sample_rate: u32, duration_ms: u64) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        let total_frames = sample_rate as u64 * duration_ms / 1000;
        for _ in 0..total_frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
