//! # ProseQL
//!
//! Embedded, schema-validated, file-backed document database for
//! human-editable data files.
//!
//! ProseQL keeps each collection as a single JSON/YAML/TOML/JSON5/Hjson (or
//! its own `.prose` prose-template) file that a person can open and edit
//! directly, while still giving application code schema validation,
//! relationships with cascading deletes, a small query language, and
//! cursor pagination on top.
//!
//! ## Quick Start
//!
//! ```rust
//! use proseql::prelude::*;
//!
//! let schema = CollectionSchema::new()
//!     .field(FieldSchema::required("title", FieldType::String))
//!     .field(FieldSchema::optional("year", FieldType::Number));
//! let config = DatabaseConfig::new().collection("books", CollectionConfig::new(schema));
//! let db = Database::open_in_memory(config)?;
//!
//! let mut book = Record::new();
//! book.insert("title".to_string(), Value::from("Dune"));
//! let created = db.collection("books").create(book)?;
//! assert_eq!(created.get("title"), Some(&Value::from("Dune")));
//! # Ok::<(), proseql::Error>(())
//! ```
//!
//! ## Key Concepts
//!
//! ### Collection
//!
//! A **collection** is one named, schema-validated set of entities, backed
//! by one file. Every entity carries a mandatory string `id`.
//!
//! ### Relationship
//!
//! Collections declare `ref` (forward foreign key, with `restrict` /
//! `cascade` / `setNull` delete behavior) and `inverse` (virtual reverse
//! view) relationships, resolved on demand by `populate`.
//!
//! ### Write coalescing
//!
//! Mutations never block on disk I/O: each collection's writes are
//! debounced through a [`Database`] write coalescer, collapsing a burst of
//! mutations into a single save.
//!
//! ## Thread Safety
//!
//! [`Database`] is `Send + Sync` and is meant to be shared across threads
//! via `Arc`. Each collection's entity map is an atomically-swapped,
//! `Arc`-shared snapshot, so reads never block behind other reads.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod coalescer;
mod collection;
mod config;
mod crud;
mod db;
mod error;
mod migration;
mod persistence;
mod relationship;
mod schema;
mod store;
mod types;
mod value;

pub mod aggregate;
pub mod codec;
pub mod query;
pub mod storage;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main database interface
pub use collection::CollectionHandle;
pub use db::Database;

// Configuration
pub use config::{CollectionConfig, DatabaseConfig, IndexSpec, SearchIndexConfig};

// Error handling
pub use error::{
    DanglingReferenceError, DuplicateKeyError, ForeignKeyError, MigrationError, NotFoundError,
    ProseQLError as Error, Result, SchemaIssue, SerializationError, StorageError,
    UnsupportedFormatError, ValidationError,
};

// Core types
pub use types::{generate_id, Timestamp};

// Document model
pub use value::{Record, Value};

// Schema
pub use schema::{CollectionSchema, FieldSchema, FieldType};

// Relationships
pub use relationship::{OnDelete, RelationshipConfig, RelationshipKind};

// Migration
pub use migration::{MigrationChain, MigrationStep, RawCollection};

// CRUD request/response types
pub use crud::{
    CascadeInfo, CreateManyOptions, CreateManyResult, DeleteResult, FieldUpdate, RelDirective,
    RelDirectives, UpdateSet, UpsertOperation, UpsertResult,
};

// Query pipeline
pub use query::{
    CmpOp, CollectionLookup, CursorConfig, Expr, PageInfo, PopulateOptions, PopulateSpec,
    QueryOptions, QueryResult, Select, SelectEntry, SortDirection, SortKeys,
};

// The identity-map snapshot type threaded through `query`/`aggregate`'s
// lower-level entry points; reachable here so those public signatures don't
// expose a type defined in a private module.
pub use store::EntityMapState;

// Aggregation
pub use aggregate::{AggregateConfig, AggregateMetrics, AggregateRow};

// Storage (for advanced users providing a custom adapter)
pub use storage::{FilesystemAdapter, MemoryAdapter, StorageAdapter, Unsubscribe};

// Codecs (for advanced users registering a custom format)
pub use codec::{CodecRegistry, Format};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common ProseQL usage.
///
/// ```rust
/// use proseql::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aggregate::{AggregateConfig, AggregateMetrics, AggregateRow};
    pub use crate::collection::CollectionHandle;
    pub use crate::config::{CollectionConfig, DatabaseConfig};
    pub use crate::crud::{CreateManyOptions, FieldUpdate, RelDirective, RelDirectives, UpdateSet};
    pub use crate::db::Database;
    pub use crate::error::{ProseQLError as Error, Result};
    pub use crate::query::{CursorConfig, Expr, QueryOptions, QueryResult, Select};
    pub use crate::relationship::{OnDelete, RelationshipConfig};
    pub use crate::schema::{CollectionSchema, FieldSchema, FieldType};
    pub use crate::types::{generate_id, Timestamp};
    pub use crate::value::{Record, Value};
}
