//! Linear-interpolation resampler
//!
//! Converts mono audio to the 16 kHz rate the segmentation model requires.
//! Output length follows the exact law `round(src_len * to_rate / from_rate)`
//! so segment timing derived from sample counts stays consistent across the
//! pipeline.

use tracing::debug;

/// Model input sample rate; all pipeline audio is normalized to this.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Mono audio resampler using linear interpolation between adjacent source
/// samples.
pub struct Resampler;

impl Resampler {
    /// Resample mono audio to the target 16 kHz rate.
    ///
    /// If the input is already at 16 kHz, returns a copy without resampling.
    pub fn resample(input: &[f32], from_rate: u32) -> Vec<f32> {
        Self::resample_to(input, from_rate, TARGET_SAMPLE_RATE)
    }

    /// Resample mono audio between arbitrary rates.
    ///
    /// Output length is `round(input.len() * to_rate / from_rate)`.
    pub fn resample_to(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
        if from_rate == to_rate || input.is_empty() {
            return input.to_vec();
        }

        debug!(
            from_rate,
            to_rate,
            input_len = input.len(),
            "Resampling audio"
        );

        let ratio = from_rate as f64 / to_rate as f64;
        let output_len =
            (input.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;

        let mut output = Vec::with_capacity(output_len);
        for i in 0..output_len {
            let src_pos = i as f64 * ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;

            let sample = if idx + 1 < input.len() {
                input[idx] * (1.0 - frac) + input[idx + 1] * frac
            } else {
                input[input.len() - 1]
            };
            output.push(sample);
        }

        output
    }
}
