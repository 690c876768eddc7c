//! ONNX segmentation model wrapper
//!
//! Loads the pyannote-style segmentation model and maps a mono 16 kHz
//! waveform to frame-level class activations. The session is process-wide,
//! initialized lazily on first use, and treated as thread-safe for
//! concurrent inference behind a mutex.
//!
//! Model interface: input `[1, 1, N]` f32 (N = sample count), output
//! `[1, F, C]` where `C = 1 + speaker slots` and class 0 is non-speech.

use crate::diarize::postprocess::Activations;
use crate::error::{Error, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};

/// Segmentation model session
pub struct SegmentationModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl SegmentationModel {
    /// Load the model from disk.
    ///
    /// Fails with `ModelLoadFailure` when the file is missing or not a
    /// valid model.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(Error::ModelLoadFailure(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| Error::ModelLoadFailure(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::ModelLoadFailure(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| Error::ModelLoadFailure(format!("{}: {}", model_path.display(), e)))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| Error::ModelLoadFailure("model has no inputs".to_string()))?;

        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| Error::ModelLoadFailure("model has no outputs".to_string()))?;

        info!(model = %model_path.display(), "Segmentation model loaded");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Run inference over a mono 16 kHz waveform.
    pub fn run(&self, samples: &[f32]) -> Result<Activations> {
        let n = samples.len();
        let input = Tensor::from_array(([1i64, 1, n as i64], samples.to_vec()))
            .map_err(|e| Error::InferenceFailure(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::InferenceFailure("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| Error::InferenceFailure(e.to_string()))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| Error::InferenceFailure("missing model output".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::InferenceFailure(e.to_string()))?;

        if shape.len() != 3 || shape[0] != 1 {
            return Err(Error::InferenceFailure(format!(
                "unexpected output shape {:?}, want [1, frames, classes]",
                shape
            )));
        }

        let num_frames = shape[1] as usize;
        let num_classes = shape[2] as usize;
        debug!(num_frames, num_classes, samples = n, "Segmentation inference done");

        Ok(Activations {
            data: data.to_vec(),
            num_frames,
            num_classes,
        })
    }
}

static MODEL: OnceLock<SegmentationModel> = OnceLock::new();
static MODEL_INIT: Mutex<()> = Mutex::new(());

/// Process-wide model accessor, initialized lazily on first use.
///
/// The path is consulted only for the first successful load; a failed load
/// is retried on the next call. Concurrent first callers serialize on the
/// init lock so the model is loaded at most once.
pub fn segmentation_model(model_path: &Path) -> Result<&'static SegmentationModel> {
    if let Some(model) = MODEL.get() {
        return Ok(model);
    }

    let _guard = MODEL_INIT
        .lock()
        .map_err(|_| Error::ModelLoadFailure("init lock poisoned".to_string()))?;
    if let Some(model) = MODEL.get() {
        return Ok(model);
    }

    let model = SegmentationModel::load(model_path)?;
    Ok(MODEL.get_or_init(|| model))
}
