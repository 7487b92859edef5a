//! Atomic durable persistence of the vault's on-disk state (§4.2)

mod atomic;
mod file;

pub use file::{parse, StoreFile, CURRENT_VERSION};

use crate::core::error::StoreError;
use atomic::StoreLock;
use std::path::{Path, PathBuf};

/// A single store file, exclusively locked for this process's lifetime.
/// `VaultService` is the only caller; it owns the passphrase dance
/// (`masterKeyCheck`) that `FileStore` itself stays agnostic to — this
/// layer only knows bytes in, bytes out, atomically.
pub struct FileStore {
    path: PathBuf,
    _lock: StoreLock,
}

impl FileStore {
    /// Acquire the store's exclusive lock. Does not read or create the
    /// file; call [`Self::load`] next.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let lock = StoreLock::acquire(&path)?;
        Ok(Self { path, _lock: lock })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and parse the store file, migrating older versions in place.
    /// Returns `None` if the file does not exist yet.
    pub fn load(&self) -> Result<Option<StoreFile>, StoreError> {
        match atomic::read_if_exists(&self.path)? {
            Some(bytes) => Ok(Some(parse(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serialize and atomically persist `store`.
    pub fn save(&self, store: &StoreFile) -> Result<(), StoreError> {
        let bytes = store.serialize()?;
        atomic::write_atomic(&self.path, &bytes)
    }
}
