//! In-memory storage adapter, used for tests and ephemeral databases.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use super::StorageAdapter;
use crate::error::{ProseQLError, Result, StorageError};

/// A `StorageAdapter` backed by a process-local map; content does not
/// survive the process and is never written to disk.
#[derive(Default)]
pub struct MemoryAdapter {
    files: RwLock<HashMap<PathBuf, String>>,
}

impl MemoryAdapter {
    /// Creates an empty in-memory adapter.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<PathBuf, String>>> {
        self.files
            .read()
            .map_err(|_| ProseQLError::operation("memory adapter lock poisoned"))
    }

    fn lock_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, String>>> {
        self.files
            .write()
            .map_err(|_| ProseQLError::operation("memory adapter lock poisoned"))
    }
}

impl StorageAdapter for MemoryAdapter {
    fn read(&self, path: &Path) -> Result<String> {
        self.lock_read()?
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()).into())
    }

    fn write(&self, path: &Path, text: &str) -> Result<()> {
        debug!(path = %path.display(), bytes = text.len(), "memory adapter write");
        self.lock_write()?.insert(path.to_path_buf(), text.to_string());
        Ok(())
    }

    fn append(&self, path: &Path, text: &str) -> Result<()> {
        let mut files = self.lock_write()?;
        files.entry(path.to_path_buf()).or_default().push_str(text);
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.lock_read()?.contains_key(path))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.lock_write()?.remove(path);
        Ok(())
    }

    fn ensure_dir(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_is_not_found() {
        let adapter = MemoryAdapter::new();
        let err = adapter.read(Path::new("a.json")).unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let adapter = MemoryAdapter::new();
        adapter.write(Path::new("a.json"), "{}").unwrap();
        assert_eq!(adapter.read(Path::new("a.json")).unwrap(), "{}");
    }

    #[test]
    fn test_remove_is_silent_on_missing() {
        let adapter = MemoryAdapter::new();
        assert!(adapter.remove(Path::new("missing.json")).is_ok());
    }

    #[test]
    fn test_append_creates_then_extends() {
        let adapter = MemoryAdapter::new();
        adapter.append(Path::new("log.jsonl"), "a\n").unwrap();
        adapter.append(Path::new("log.jsonl"), "b\n").unwrap();
        assert_eq!(adapter.read(Path::new("log.jsonl")).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_exists() {
        let adapter = MemoryAdapter::new();
        assert!(!adapter.exists(Path::new("a.json")).unwrap());
        adapter.write(Path::new("a.json"), "{}").unwrap();
        assert!(adapter.exists(Path::new("a.json")).unwrap());
    }
}
