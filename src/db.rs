//! The database facade (C11): wires configuration, per-collection entity
//! stores, the codec registry, the storage adapter, and the write coalescer
//! into the one object applications hold.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use proseql::{Database, DatabaseConfig};
//!
//! let db = Database::open_in_memory(DatabaseConfig::new())?;
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{info, instrument};

use crate::coalescer::Coalescer;
use crate::codec::CodecRegistry;
use crate::config::{CollectionConfig, DatabaseConfig};
use crate::error::{ProseQLError, Result};
use crate::persistence;
use crate::query::CollectionLookup;
use crate::relationship::RelationshipConfig;
use crate::storage::{FilesystemAdapter, MemoryAdapter, StorageAdapter};
use crate::store::{EntityMapState, EntityStore};

/// The open database: one [`crate::store::EntityStore`] per configured
/// collection, backed by a shared storage adapter and codec registry, with
/// a debounced coalescer driving saves (spec.md §4.4, §4.11).
///
/// # Thread Safety
///
/// `Database` is `Send + Sync` and is meant to be shared across threads
/// behind an `Arc`: every collection's entity store uses an internal
/// `RwLock<Arc<EntityMapState>>`, so reads never block on other reads.
pub struct Database {
    config: Arc<DatabaseConfig>,
    stores: Arc<IndexMap<String, EntityStore>>,
    registry: Arc<CodecRegistry>,
    storage: Arc<dyn StorageAdapter>,
    coalescer: Arc<Coalescer>,
}

impl Database {
    /// Opens a database against the filesystem, rooted at `config.root_dir`
    /// (or the current directory if unset). Every collection with a `file`
    /// configured is loaded (and migrated, if behind its declared version);
    /// collections without one start empty.
    #[instrument(skip(config))]
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let root = config.root_dir.clone().unwrap_or_else(|| ".".into());
        Self::open_with_storage(config, Arc::new(FilesystemAdapter::new(root)))
    }

    /// Opens a database backed by an in-memory storage adapter. Intended
    /// for tests and for collections with no durable `file`.
    pub fn open_in_memory(config: DatabaseConfig) -> Result<Self> {
        Self::open_with_storage(config, Arc::new(MemoryAdapter::new()))
    }

    /// Opens a database against an arbitrary storage adapter.
    ///
    /// Validates every collection's migration registry first (spec.md §7:
    /// "no partial facade is exposed" on a bad registry), then loads each
    /// collection's file through the persistence pipeline.
    pub fn open_with_storage(config: DatabaseConfig, storage: Arc<dyn StorageAdapter>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(CodecRegistry::with_builtin_formats());
        let mut stores = IndexMap::new();
        for (name, collection_config) in &config.collections {
            let loaded = persistence::load(name, collection_config, &registry, storage.as_ref())?;
            let state = EntityStore::build_state(name, collection_config, loaded.entities)?;
            let store = EntityStore::empty();
            store.swap(state);
            stores.insert(name.clone(), store);
            info!(collection = name.as_str(), "collection ready");
        }

        let config = Arc::new(config);
        let stores = Arc::new(stores);
        let saver = build_saver(Arc::clone(&config), Arc::clone(&stores), Arc::clone(&registry), Arc::clone(&storage));
        let coalescer = Coalescer::new(config.write_debounce, saver);

        Ok(Self {
            config,
            stores,
            registry,
            storage,
            coalescer,
        })
    }

    /// The configuration for `collection`, or an operation error if it was
    /// never declared.
    pub fn config(&self, collection: &str) -> Result<&CollectionConfig> {
        self.config
            .collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))
    }

    /// The entity store for `collection`, or an operation error if it was
    /// never declared.
    pub fn store(&self, collection: &str) -> Result<&EntityStore> {
        self.stores.get(collection).ok_or_else(|| unknown_collection(collection))
    }

    /// A cheap `Arc` snapshot of `collection`'s current state.
    pub fn snapshot(&self, collection: &str) -> Result<Arc<EntityMapState>> {
        Ok(self.store(collection)?.snapshot())
    }

    /// The relationship declarations for `collection`, if it exists.
    pub fn relationships_of(&self, collection: &str) -> Option<&IndexMap<String, RelationshipConfig>> {
        self.config.collections.get(collection).map(|c| &c.relationships)
    }

    /// The field names `$search` considers by default for `collection`,
    /// when a query's `search` clause gives none explicitly.
    pub fn default_search_fields(&self, collection: &str) -> Vec<String> {
        self.config
            .collections
            .get(collection)
            .and_then(|c| c.search_index.as_ref())
            .map(|s| s.fields.clone())
            .unwrap_or_default()
    }

    /// Every declared collection name, in configuration order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.config.collections.keys().map(String::as_str)
    }

    /// Called by `crud.rs` after a state swap lands. Arms the write
    /// coalescer for `collection` if it has a durable file configured;
    /// collections with no file are never persisted.
    pub fn after_mutation(&self, collection: &str) {
        if self.config.collections.get(collection).is_some_and(|c| c.file.is_some()) {
            self.coalescer.schedule(collection);
        }
    }

    /// Executes every pending coalesced save immediately, in parallel, and
    /// propagates the first failure encountered (spec.md §4.4).
    pub fn flush(&self) -> Result<()> {
        let names = self.coalescer.drain_pending();
        let handles: Vec<_> = names
            .into_iter()
            .map(|name| {
                let config = Arc::clone(&self.config);
                let stores = Arc::clone(&self.stores);
                let registry = Arc::clone(&self.registry);
                let storage = Arc::clone(&self.storage);
                std::thread::spawn(move || -> Result<()> {
                    let collection_config = config.collections.get(&name).ok_or_else(|| unknown_collection(&name))?;
                    let store = stores.get(&name).ok_or_else(|| unknown_collection(&name))?;
                    let snapshot = store.snapshot();
                    persistence::save(&name, collection_config, &registry, storage.as_ref(), &snapshot.entities)
                })
            })
            .collect();

        let mut first_err = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_err.get_or_insert(e);
                }
                Err(_) => {
                    first_err.get_or_insert(ProseQLError::operation("save thread panicked"));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of collections with a pending, not-yet-fired coalesced save.
    pub fn pending_count(&self) -> usize {
        self.coalescer.pending_count()
    }
}

impl CollectionLookup for Database {
    fn snapshot_of(&self, name: &str) -> Option<Arc<EntityMapState>> {
        self.stores.get(name).map(|s| s.snapshot())
    }

    fn relationships_of(&self, name: &str) -> Option<&IndexMap<String, RelationshipConfig>> {
        Database::relationships_of(self, name)
    }
}

fn unknown_collection(name: &str) -> ProseQLError {
    ProseQLError::operation(format!("unknown collection '{name}'"))
}

fn build_saver(
    config: Arc<DatabaseConfig>,
    stores: Arc<IndexMap<String, EntityStore>>,
    registry: Arc<CodecRegistry>,
    storage: Arc<dyn StorageAdapter>,
) -> Arc<dyn Fn(&str) + Send + Sync> {
    Arc::new(move |name: &str| {
        let (Some(collection_config), Some(store)) = (config.collections.get(name), stores.get(name)) else {
            return;
        };
        let snapshot = store.snapshot();
        if let Err(e) = persistence::save(name, collection_config, &registry, storage.as_ref(), &snapshot.entities) {
            crate::coalescer::log_swallowed_error(name, &e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::schema::CollectionSchema;
    use crate::value::{Record, Value};

    fn memory_db() -> Database {
        let config = DatabaseConfig::new().collection(
            "books",
            CollectionConfig::new(CollectionSchema::new()).file("books.json"),
        );
        Database::open_in_memory(config).unwrap()
    }

    #[test]
    fn test_open_in_memory_starts_empty() {
        let db = memory_db();
        assert_eq!(db.snapshot("books").unwrap().entities.len(), 0);
    }

    #[test]
    fn test_unknown_collection_is_operation_error() {
        let db = memory_db();
        assert!(db.snapshot("nope").is_err());
    }

    #[test]
    fn test_after_mutation_then_flush_saves() {
        let db = memory_db();
        let store = db.store("books").unwrap();
        let mut entities = IndexMap::new();
        let mut r = Record::new();
        r.insert("id".to_string(), Value::from("1"));
        entities.insert("1".to_string(), r);
        let config = db.config("books").unwrap();
        store.swap(EntityStore::build_state("books", config, entities).unwrap());
        db.after_mutation("books");
        assert_eq!(db.pending_count(), 1);
        db.flush().unwrap();
        assert_eq!(db.pending_count(), 0);
    }

    #[test]
    fn test_db_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Database>();
    }
}
