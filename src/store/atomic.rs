//! Low-level atomic file I/O: tmp-file + fsync + rename, plus an advisory
//! exclusive lock that enforces the single-writer-process model (§4.2, §5).

use crate::core::error::StoreError;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Holds the exclusive advisory lock on the store file for the service's
/// lifetime. Dropping it releases the lock (fs2 locks are released on
/// file-handle close, which happens on `Drop`).
pub struct StoreLock {
    path: PathBuf,
    _lock_file: File,
}

impl StoreLock {
    /// Acquire the store's exclusive lock. Fails immediately
    /// (`StoreError::Locked`) if another process already holds it — this
    /// crate targets exactly one writer process per store path (§1
    /// non-goals, §5).
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::WriteFailure(e.to_string()))?;
        }
        let lock_path = lock_file_path(path);
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::WriteFailure(e.to_string()))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;
        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_file_path(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    store_path.with_file_name(name)
}

/// Read the full contents of `path`, or `None` if it does not exist yet.
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match File::open(path) {
        Ok(mut f) => {
            let mut buf = Vec::new();
            f.read_to_end(&mut buf)
                .map_err(|e| StoreError::ReadFailure(e.to_string()))?;
            Ok(Some(buf))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::ReadFailure(e.to_string())),
    }
}

/// Write `bytes` to `path` via a sibling tmp file, `fsync`, then atomic
/// rename. The rename is the commit point: on crash mid-write the
/// previously committed file is untouched, and no tmp file survives a
/// successful write (§4.2).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let atomic_file = AtomicFile::new(path, OverwriteBehavior::AllowOverwrite);
    atomic_file
        .write(|f| f.write_all(bytes))
        .map_err(|e| StoreError::WriteFailure(format!("{e:?}")))
}
