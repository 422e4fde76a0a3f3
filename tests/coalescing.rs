//! S4: a burst of mutations within the debounce window collapses into one write.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proseql::{CollectionConfig, CollectionSchema, Database, DatabaseConfig, StorageAdapter};
use proseql::{Record, Value};

/// Wraps `MemoryAdapter`-like in-memory storage while counting `write` calls.
struct CountingAdapter {
    inner: proseql::MemoryAdapter,
    writes: Arc<AtomicUsize>,
}

impl StorageAdapter for CountingAdapter {
    fn read(&self, path: &Path) -> proseql::Result<String> {
        self.inner.read(path)
    }
    fn write(&self, path: &Path, text: &str) -> proseql::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, text)
    }
    fn append(&self, path: &Path, text: &str) -> proseql::Result<()> {
        self.inner.append(path, text)
    }
    fn exists(&self, path: &Path) -> proseql::Result<bool> {
        self.inner.exists(path)
    }
    fn remove(&self, path: &Path) -> proseql::Result<()> {
        self.inner.remove(path)
    }
    fn ensure_dir(&self, path: &Path) -> proseql::Result<()> {
        self.inner.ensure_dir(path)
    }
}

#[test]
fn a_burst_of_creates_collapses_into_one_write() {
    let writes = Arc::new(AtomicUsize::new(0));
    let storage = Arc::new(CountingAdapter {
        inner: proseql::MemoryAdapter::new(),
        writes: writes.clone(),
    });

    let schema = CollectionSchema::new().field(proseql::FieldSchema::required(
        "title",
        proseql::FieldType::String,
    ));
    let config = DatabaseConfig {
        write_debounce: Duration::from_millis(10),
        ..DatabaseConfig::new().collection("books", CollectionConfig::new(schema).file("books.json"))
    };

    let db = Database::open_with_storage(config, storage).unwrap();
    let books = db.collection("books");
    for i in 0..100 {
        let mut r = Record::new();
        r.insert("id".to_string(), Value::from(format!("b{i}")));
        r.insert("title".to_string(), Value::from(format!("Book {i}")));
        books.create(r).unwrap();
    }

    assert_eq!(writes.load(Ordering::SeqCst), 0);
    db.flush().unwrap();
    assert_eq!(writes.load(Ordering::SeqCst), 1);
    assert_eq!(db.pending_count(), 0);

    let snapshot = db.snapshot("books").unwrap();
    assert_eq!(snapshot.entities.len(), 100);
}
