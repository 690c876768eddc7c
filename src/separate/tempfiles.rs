//! Tracked temporary files
//!
//! The separation pipeline creates a fan of intermediates (per-segment
//! slices, worker output directories, final clips). Every path is registered
//! here so a single cleanup call can unlink them all on any exit path:
//! success, error, or cancellation. Cleanup never relies on destructors.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use uuid::Uuid;

/// Build a collision-safe temp path under the system temp directory.
///
/// Names carry a timestamp and a random suffix so concurrent workers can
/// share the directory.
pub fn salted_path(prefix: &str, extension: &str) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let salt = Uuid::new_v4().simple();
    let name = if extension.is_empty() {
        format!("{}_{}_{}", prefix, millis, salt)
    } else {
        format!("{}_{}_{}.{}", prefix, millis, salt, extension)
    };
    std::env::temp_dir().join(name)
}

/// Set of temp paths owned by one pipeline run
#[derive(Debug, Default)]
pub struct TempFileSet {
    paths: Mutex<HashSet<PathBuf>>,
}

impl TempFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for cleanup.
    pub fn track(&self, path: impl Into<PathBuf>) {
        self.paths.lock().unwrap().insert(path.into());
    }

    /// Stop tracking a path (e.g. after it was already removed).
    pub fn untrack(&self, path: &Path) {
        self.paths.lock().unwrap().remove(path);
    }

    /// Number of currently tracked paths.
    pub fn len(&self) -> usize {
        self.paths.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unlink every tracked path, best effort.
    ///
    /// Directories are removed recursively. Failures are logged and do not
    /// interrupt the remaining removals.
    pub fn cleanup_all(&self) {
        let paths: Vec<PathBuf> = self.paths.lock().unwrap().drain().collect();
        for path in paths {
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            if let Err(e) = result {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove temp path");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salted_paths_are_unique() {
        let a = salted_path("voxsplit_test", "wav");
        let b = salted_path("voxsplit_test", "wav");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with(".wav"));
    }

    #[test]
    fn test_cleanup_removes_tracked_files() {
        let set = TempFileSet::new();

        let file = salted_path("voxsplit_test_file", "tmp");
        std::fs::write(&file, b"scratch").unwrap();
        set.track(&file);

        let dir = salted_path("voxsplit_test_dir", "");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("inner.tmp"), b"scratch").unwrap();
        set.track(&dir);

        assert_eq!(set.len(), 2);
        set.cleanup_all();

        assert!(!file.exists());
        assert!(!dir.exists());
        assert!(set.is_empty());
    }

    #[test]
    fn test_cleanup_tolerates_missing_paths() {
        let set = TempFileSet::new();
        set.track(salted_path("voxsplit_never_created", "tmp"));
        set.cleanup_all();
        assert!(set.is_empty());
    }

    #[test]
    fn test_untrack_excludes_path_from_cleanup() {
        let set = TempFileSet::new();
        let file = salted_path("voxsplit_keep", "tmp");
        std::fs::write(&file, b"keep me").unwrap();

        set.track(&file);
        set.untrack(&file);
        set.cleanup_all();

        assert!(file.exists());
        std::fs::remove_file(&file).unwrap();
    }
}
