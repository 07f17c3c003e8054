//! Scratch-file helpers for downloaded and transcoded media.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

/// A scratch file inside the configured temp directory. The file is removed
/// when the guard drops, whether or not the pipeline step succeeded.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Reserve a unique path under `dir`. The file itself is created by
    /// whoever writes to it (downloader or ffmpeg).
    pub fn in_dir(dir: &Path, hint: &str) -> Self {
        let name = format!("{}_{hint}", Uuid::new_v4().simple());
        TempFile {
            path: dir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
}

/// Create `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))
}
