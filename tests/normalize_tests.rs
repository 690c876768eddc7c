//! Audio normalization tests
//!
//! End-to-end checks of the in-process path: arbitrary-rate WAV input to
//! mono 16 kHz f32 in [-1, 1], with the mean downmix and the resampler's
//! output-length law observable from the outside.

mod helpers;

use helpers::audio_generator::{silent_wav, sine_wav, stereo_wav};
use tokio_util::sync::CancellationToken;
use voxsplit::audio::{normalize, TARGET_SAMPLE_RATE};
use voxsplit::error::Error;

#[tokio::test]
async fn test_44k_input_lands_at_16k() {
    let bytes = sine_wav(44100, 2000, 440.0, 0.5);
    let audio = normalize(&bytes, Some("wav"), "ffmpeg", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(audio.sample_rate, TARGET_SAMPLE_RATE);
    assert_eq!(audio.samples.len(), 32000); // 2 s at 16 kHz
    assert!((audio.duration() - 2.0).abs() < 0.001);
}

#[tokio::test]
async fn test_odd_rate_follows_length_law() {
    // 1 s at 22050 Hz: round(22050 * 16000/22050) = 16000
    let bytes = sine_wav(22050, 1000, 330.0, 0.5);
    let audio = normalize(&bytes, Some("wav"), "ffmpeg", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(audio.samples.len(), 16000);
}

#[tokio::test]
async fn test_samples_stay_in_unit_range() {
    let bytes = sine_wav(16000, 500, 880.0, 0.95);
    let audio = normalize(&bytes, Some("wav"), "ffmpeg", &CancellationToken::new())
        .await
        .unwrap();

    assert!(audio
        .samples
        .iter()
        .all(|&s| (-1.0..=1.0).contains(&s)));
}

#[tokio::test]
async fn test_stereo_downmix_is_channel_mean() {
    // Left carries a tone, right is silence: the mono mix halves the RMS
    let stereo = stereo_wav(16000, 1000, 440.0, 0.0);
    let mixed = normalize(&stereo, Some("wav"), "ffmpeg", &CancellationToken::new())
        .await
        .unwrap();

    let mono = sine_wav(16000, 1000, 440.0, 0.5);
    let reference = normalize(&mono, Some("wav"), "ffmpeg", &CancellationToken::new())
        .await
        .unwrap();

    let rms = |samples: &[f32]| {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    };

    let mixed_rms = rms(&mixed.samples);
    let reference_rms = rms(&reference.samples);
    assert!(
        (mixed_rms - reference_rms / 2.0).abs() < 0.02,
        "expected ~{:.3}, got {:.3}",
        reference_rms / 2.0,
        mixed_rms
    );
}

#[tokio::test]
async fn test_silence_is_not_empty_audio() {
    // Zero amplitude is still a waveform; EmptyAudio is about zero samples
    let bytes = silent_wav(16000, 700);
    let audio = normalize(&bytes, Some("wav"), "ffmpeg", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(audio.samples.len(), 11200);
    assert!(audio.samples.iter().all(|&s| s == 0.0));
}

#[tokio::test]
async fn test_text_file_renamed_wav_fails_decode() {
    let bytes = b"To be, or not to be, that is the question".to_vec();
    let result = normalize(&bytes, Some("wav"), "ffmpeg", &CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::AudioDecodeFailure(_))));
}
