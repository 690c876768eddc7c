//! voxsplit library interface
//!
//! Speaker-diarization web service: uploads are normalized to 16 kHz mono,
//! run through an ONNX segmentation model, and post-processed into speaker-
//! labeled time segments. A companion pipeline slices the original audio by
//! segment and invokes an external source-separation worker to export
//! per-speaker clips as a ZIP archive.
//!
//! Exposed as a library for integration testing; the binary entry point is
//! `src/main.rs`.

pub mod api;
pub mod audio;
pub mod cache;
pub mod config;
pub mod diarize;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod separate;
pub mod state;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::state::AppState;
