//! ZIP packaging of separated clips

use crate::error::{Error, Result};
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One archive entry: the final clip on disk and its entry name,
/// `"<speaker>_<start>-<end>.wav"` with times at two decimals.
#[derive(Debug)]
pub struct ArchiveEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Format an entry name for a separated clip.
pub fn entry_name(speaker_name: &str, start_time: f64, end_time: f64) -> String {
    format!("{}_{:.2}-{:.2}.wav", speaker_name, start_time, end_time)
}

/// Read every entry's file and package them into a single in-memory ZIP.
pub fn build_zip(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|e| Error::Internal(format!("zip entry {}: {}", entry.name, e)))?;

        let mut file = std::fs::File::open(&entry.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        writer
            .write_all(&buf)
            .map_err(|e| Error::Internal(format!("zip write {}: {}", entry.name, e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| Error::Internal(format!("zip finalize: {}", e)))?;
    Ok(cursor.into_inner())
}
