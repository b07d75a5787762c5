//! Exclusive ownership of the checkpoint file
//!
//! Advisory locking with fd-lock. Only one process may own a checkpoint file.

use super::store::CheckpointError;
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Held for the lifetime of a [`super::CheckpointStore`]
///
/// The lock is released when the lock file descriptor is closed, i.e. on drop.
pub struct StoreLock {
    #[allow(dead_code)]
    lock: RwLock<File>,
    path: PathBuf,
}

impl StoreLock {
    /// Try to take the exclusive lock next to `store_path` without blocking
    ///
    /// Returns [`CheckpointError::Locked`] if another owner holds it.
    pub fn try_acquire(store_path: &Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = store_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io(e.to_string()))?;
            }
        }

        let lock_path = store_path.with_extension("lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CheckpointError::Io(format!("Failed to open lock file: {e}")))?;

        let mut lock = RwLock::new(file);
        {
            let guard = lock.try_write().map_err(|_| {
                CheckpointError::Locked(format!(
                    "checkpoint file {} is owned by another process (lock: {})",
                    store_path.display(),
                    lock_path.display()
                ))
            })?;
            // Keep the flock past the guard; closing the descriptor releases it.
            std::mem::forget(guard);
        }

        debug!(path = %lock_path.display(), "Acquired checkpoint store lock");
        Ok(Self {
            lock,
            path: lock_path,
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock").field("path", &self.path).finish()
    }
}
