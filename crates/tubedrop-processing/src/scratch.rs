//! Per-request scratch directories.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tubedrop_core::constants::SCRATCH_DIR_PREFIX;

/// A uniquely named directory owned by one pipeline run.
///
/// The directory and everything in it is removed when the guard is dropped,
/// on every exit path. Removal failures are logged, never propagated.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, creating `root` if needed.
    pub async fn create(root: &Path) -> io::Result<Self> {
        let root = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root)?;
            tempfile::Builder::new()
                .prefix(SCRATCH_DIR_PREFIX)
                .tempdir_in(&root)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "Scratch directory created");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => tracing::debug!(path = %self.path.display(), "Scratch directory removed"),
                Err(e) => tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove scratch directory"
                ),
            }
        }
    }
}
