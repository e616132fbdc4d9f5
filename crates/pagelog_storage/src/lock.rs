//! Single-writer lock on a journal directory.
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK                 # held exclusively by the writing process
//! ├─ values.journal
//! ├─ pages.journal
//! └─ pageLines.journal
//! ```
//!
//! Readers that open journals read-only never take the lock.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// An exclusive advisory lock on a journal directory.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    _file: File,
}

impl DirLock {
    /// Creates `dir` if needed and locks it without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle holds the lock,
    /// or an I/O error if the lock file cannot be opened.
    pub fn acquire(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(dir.to_path_buf()));
        }

        tracing::debug!(dir = %dir.display(), "journal directory locked");
        Ok(Self {
            path: dir.to_path_buf(),
            _file: file,
        })
    }

    /// The locked directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_lock_is_refused() {
        let dir = tempdir().unwrap();
        let held = DirLock::acquire(dir.path()).unwrap();
        assert_eq!(held.path(), dir.path());

        match DirLock::acquire(dir.path()) {
            Err(StorageError::Locked(path)) => assert_eq!(path, dir.path()),
            other => panic!("expected lock conflict, got {other:?}"),
        }
    }

    #[test]
    fn drop_releases_lock() {
        let dir = tempdir().unwrap();
        drop(DirLock::acquire(dir.path()).unwrap());
        assert!(DirLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let _lock = DirLock::acquire(&nested).unwrap();
        assert!(nested.join(LOCK_FILE).is_file());
    }
}
