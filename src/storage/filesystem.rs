//! Filesystem storage adapter: the production backend for persistent
//! databases.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use uuid::Uuid;

use super::StorageAdapter;
use crate::error::{Result, StorageError};

/// A `StorageAdapter` backed by `std::fs`, rooted at a base directory.
///
/// `write` is atomic: the new content is written to a sibling temp file
/// and renamed into place, so a crash mid-write never leaves a partially
/// written collection file.
pub struct FilesystemAdapter {
    root: PathBuf,
}

impl FilesystemAdapter {
    /// Creates an adapter rooted at `root`. The directory is not created
    /// eagerly; `ensure_dir` (or the first `write`) creates it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl StorageAdapter for FilesystemAdapter {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn read(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path);
        fs::read_to_string(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(full.clone()).into()
            } else {
                StorageError::Write {
                    path: full,
                    cause: e.to_string(),
                }
                .into()
            }
        })
    }

    #[instrument(skip(self, text), fields(path = %path.display(), bytes = text.len()))]
    fn write(&self, path: &Path, text: &str) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::EnsureDir {
                path: parent.to_path_buf(),
                cause: e.to_string(),
            })?;
        }
        let tmp = full.with_extension(format!("tmp-{}", Uuid::new_v4()));
        fs::write(&tmp, text).map_err(|e| StorageError::Write {
            path: full.clone(),
            cause: e.to_string(),
        })?;
        fs::rename(&tmp, &full).map_err(|e| StorageError::Write {
            path: full.clone(),
            cause: e.to_string(),
        })?;
        debug!("wrote collection file");
        Ok(())
    }

    fn append(&self, path: &Path, text: &str) -> Result<()> {
        use std::io::Write;
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::EnsureDir {
                path: parent.to_path_buf(),
                cause: e.to_string(),
            })?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .map_err(|e| StorageError::Append {
                path: full.clone(),
                cause: e.to_string(),
            })?;
        file.write_all(text.as_bytes()).map_err(|e| StorageError::Append {
            path: full,
            cause: e.to_string(),
        })?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Remove {
                path: full,
                cause: e.to_string(),
            }
            .into()),
        }
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        fs::create_dir_all(&full).map_err(|e| {
            StorageError::EnsureDir {
                path: full,
                cause: e.to_string(),
            }
            .into()
        })
    }
}
