//! Single-owner lock on the data directory

use anyhow::{anyhow, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "inbox.lock";

/// Held for the lifetime of a serving process; released on drop
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Take the exclusive lock, failing fast if another process holds it
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow!(
                "{} is locked by another process; only one server may own the inbox",
                path.display()
            )
        })?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let first = StoreLock::acquire(dir.path()).unwrap();
        assert!(StoreLock::acquire(dir.path()).is_err());
        drop(first);
        assert!(StoreLock::acquire(dir.path()).is_ok());
    }
}
