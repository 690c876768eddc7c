//! Source-separation worker invocation
//!
//! Launches the external separation model as a subprocess:
//! `python3 SCRIPT IN_WAV OUT_DIR N`. The worker writes one WAV per source
//! into OUT_DIR and reports the outcome as a JSON object on its final
//! stdout line: `{success, output_paths?, num_sources?, error?}`.
//!
//! Invocation discipline: 120 s wall timeout, 50 MiB stdout cap, and the
//! pipeline's cancellation token kills the child.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-invocation wall-time budget.
const WORKER_TIMEOUT: Duration = Duration::from_secs(120);

/// Stdout capture cap; the worker's JSON status line is tiny, anything near
/// this size is runaway output.
const MAX_OUTPUT_BYTES: u64 = 50 * 1024 * 1024;

/// Worker status line
#[derive(Debug, Deserialize)]
struct WorkerResponse {
    success: bool,
    output_paths: Option<Vec<String>>,
    #[allow(dead_code)]
    num_sources: Option<usize>,
    error: Option<String>,
}

/// Run one separation over a 16 kHz mono WAV slice.
///
/// Returns the worker's output paths in source order.
pub async fn run_separation(
    script: &Path,
    input_wav: &Path,
    output_dir: &Path,
    num_sources: usize,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>> {
    debug!(
        script = %script.display(),
        input = %input_wav.display(),
        num_sources,
        "Launching separation worker"
    );

    let mut child = Command::new("python3")
        .arg(script)
        .arg(input_wav)
        .arg(output_dir)
        .arg(num_sources.to_string())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::SeparationFailure(format!("cannot launch worker: {}", e)))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::SeparationFailure("worker stdout unavailable".to_string()))?;

    let run = async {
        let mut buf = Vec::new();
        (&mut stdout)
            .take(MAX_OUTPUT_BYTES + 1)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| Error::SeparationFailure(format!("worker stdout read: {}", e)))?;
        if buf.len() as u64 > MAX_OUTPUT_BYTES {
            return Err(Error::SeparationFailure(
                "worker output exceeded 50 MiB cap".to_string(),
            ));
        }
        let status = child
            .wait()
            .await
            .map_err(|e| Error::SeparationFailure(format!("worker wait: {}", e)))?;
        Ok((buf, status))
    };

    let (stdout_buf, status) = tokio::select! {
        res = run => res?,
        _ = cancel.cancelled() => {
            warn!("Separation cancelled, killing worker");
            return Err(Error::Cancelled);
        }
        _ = tokio::time::sleep(WORKER_TIMEOUT) => {
            warn!(timeout_s = WORKER_TIMEOUT.as_secs(), "Separation worker timed out");
            return Err(Error::Timeout);
        }
    };

    parse_response(&stdout_buf, status.success())
}

/// Parse the final stdout line as the worker's JSON status.
fn parse_response(stdout: &[u8], exit_ok: bool) -> Result<Vec<PathBuf>> {
    let text = String::from_utf8_lossy(stdout);
    let last_line = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| {
            Error::SeparationFailure(if exit_ok {
                "worker produced no output".to_string()
            } else {
                "worker exited abnormally with no output".to_string()
            })
        })?;

    let response: WorkerResponse = serde_json::from_str(last_line.trim()).map_err(|e| {
        Error::SeparationFailure(format!("unparseable worker response: {}", e))
    })?;

    if !response.success {
        return Err(Error::SeparationFailure(
            response
                .error
                .unwrap_or_else(|| "worker reported failure without detail".to_string()),
        ));
    }

    let paths = response
        .output_paths
        .unwrap_or_default()
        .into_iter()
        .map(PathBuf::from)
        .collect::<Vec<_>>();

    if paths.is_empty() {
        return Err(Error::SeparationFailure(
            "worker reported success with no output paths".to_string(),
        ));
    }

    Ok(paths)
}
