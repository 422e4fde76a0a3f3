//! Storage adapter abstractions (C2).
//!
//! This module provides a trait-based byte/text-level abstraction over
//! where a collection's encoded text lives, so the persistence pipeline
//! (`src/persistence.rs`) never depends on a concrete backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Database                                │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │   StorageAdapter    │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                    ▲         ▲                              │
//! │                    │         │                              │
//! │       ┌───────────┴─┐   ┌──┴──────────────┐                │
//! │       │FilesystemAdapter│   │ MemoryAdapter │               │
//! │       └───────────────┘   └─────────────────┘               │
//! │           (prod)              (test / browser-like)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod filesystem;
mod memory;

pub use filesystem::FilesystemAdapter;
pub use memory::MemoryAdapter;

use std::path::Path;

use crate::error::Result;

/// A no-op unsubscribe handle returned by [`StorageAdapter::watch`].
pub struct Unsubscribe(Box<dyn FnOnce() + Send>);

impl Unsubscribe {
    /// Wraps a cancellation closure.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Cancels the watch.
    pub fn cancel(self) {
        (self.0)()
    }
}

/// Byte/text-oriented storage backend for named paths.
///
/// Implementations must be `Send + Sync` so a [`crate::Database`] can be
/// shared across threads. Every operation maps its failure mode onto a
/// tagged [`crate::error::StorageError`] variant (spec.md §4.2).
pub trait StorageAdapter: Send + Sync {
    /// Reads the text stored at `path`. Fails with
    /// [`crate::error::StorageError::NotFound`] if absent.
    fn read(&self, path: &Path) -> Result<String>;

    /// Atomically replaces the text stored at `path`, creating it if absent.
    fn write(&self, path: &Path, text: &str) -> Result<()>;

    /// Appends `text` to the content at `path` (creating it if absent). Not
    /// used by the core save/load pipeline; reserved for append-only logs.
    fn append(&self, path: &Path, text: &str) -> Result<()>;

    /// Returns whether `path` currently has content.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Removes the content at `path`. Silent (not an error) if absent.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Ensures the parent directory of `path` exists. A no-op where not
    /// meaningful (e.g. the in-memory adapter).
    fn ensure_dir(&self, path: &Path) -> Result<()>;

    /// Registers a change listener for `path`. The default implementation
    /// is a no-op that returns an inert unsubscribe handle, as permitted by
    /// spec.md §4.2.
    fn watch(&self, _path: &Path, _on_change: Box<dyn Fn() + Send>) -> Result<Unsubscribe> {
        Ok(Unsubscribe::new(|| {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsubscribe_runs_closure_on_cancel() {
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag2 = flag.clone();
        let unsub = Unsubscribe::new(move || flag2.store(true, std::sync::atomic::Ordering::SeqCst));
        unsub.cancel();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
