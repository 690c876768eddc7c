//! Audio normalization
//!
//! Everything between raw upload bytes and the mono 16 kHz f32 waveform the
//! segmentation model consumes: in-process decoding (symphonia), channel
//! downmix, linear resampling, WAV I/O for pipeline intermediates, and the
//! external-tool fallback for containers the in-process path cannot read.

pub mod decode;
pub mod normalize;
pub mod resample;
pub mod wav;

pub use decode::{decode_to_mono, DecodedAudio};
pub use normalize::{normalize, NormalizedAudio};
pub use resample::{Resampler, TARGET_SAMPLE_RATE};
