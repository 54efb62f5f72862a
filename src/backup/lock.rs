//! Single-flight lock for snapshot and restore runs
//!
//! An exclusive advisory lock on `backup.lock` in the data directory. A manual
//! and a scheduled backup started at the same moment run one after the other.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{GastroError, GastroResult};

/// Held for the duration of one snapshot or restore; released on drop
#[derive(Debug)]
pub struct OperationLock {
    file: File,
    path: PathBuf,
}

impl OperationLock {
    /// Block until the lock at `path` is acquired
    pub fn acquire(path: &Path) -> GastroResult<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive().map_err(|e| {
            GastroError::Io(format!("Failed to lock {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "operation lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Acquire the lock only if nobody else holds it
    pub fn try_acquire(path: &Path) -> GastroResult<Option<Self>> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(GastroError::Io(format!(
                "Failed to lock {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "operation lock released");
    }
}

fn open_lock_file(path: &Path) -> GastroResult<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| GastroError::Io(format!("Failed to open {}: {}", path.display(), e)))
}
