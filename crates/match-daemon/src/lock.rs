//! Cross-process exclusion for one snapshot.
//!
//! Each invocation loads the snapshot, applies one command and saves it
//! back, so two invocations on the same snapshot must not overlap. The lock
//! is an advisory exclusive lock on `<snapshot>.lock`, released on drop.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::{debug, warn};

/// Held for the whole load, command and save sequence.
#[derive(Debug)]
pub struct SnapshotLock {
    file: File,
    path: PathBuf,
}

impl SnapshotLock {
    /// Block until no other holder has the lock for `snapshot_path`.
    pub fn acquire(snapshot_path: &Path) -> Result<Self> {
        let path = lock_path(snapshot_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {:?}", path))?;
        FileExt::lock_exclusive(&file).with_context(|| format!("Failed to lock {:?}", path))?;

        debug!(path = ?path, "Acquired snapshot lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        // Closing the file releases the lock anyway.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = ?self.path, error = %e, "Failed to release snapshot lock");
        }
    }
}

/// `<snapshot>.lock`
pub fn lock_path(snapshot_path: &Path) -> PathBuf {
    let mut name = snapshot_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
