//! WAV read/write for pipeline intermediates
//!
//! The separation pipeline and the external-tool fallback exchange audio on
//! disk as 16-bit PCM WAV. Reads accept 16-bit int and 32-bit float WAVs at
//! any channel count (channels are mean-downmixed); writes always produce
//! mono 16-bit at the pipeline rate.

use crate::error::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Read a WAV file into mono f32 samples, returning the file's sample rate.
pub fn read_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path)
        .map_err(|e| Error::AudioDecodeFailure(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::AudioDecodeFailure(format!("{}: {}", path.display(), e)))?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::AudioDecodeFailure(format!("{}: {}", path.display(), e)))?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::AudioDecodeFailure(format!("{}: {}", path.display(), e)))?,
        (format, bits) => {
            return Err(Error::AudioDecodeFailure(format!(
                "unsupported WAV sample format: {:?} {}-bit",
                format, bits
            )));
        }
    };

    let mono = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}

/// Write mono f32 samples as a 16-bit PCM WAV at the given rate.
///
/// Samples are clamped to [-1, 1] before quantization.
pub fn write_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| Error::Internal(format!("WAV create {}: {}", path.display(), e)))?;

    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| Error::Internal(format!("WAV write {}: {}", path.display(), e)))?;
    }

    writer
        .finalize()
        .map_err(|e| Error::Internal(format!("WAV finalize {}: {}", path.display(), e)))?;

    Ok(())
}
