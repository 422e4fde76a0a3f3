//! Configuration types for ProseQL.
//!
//! [`DatabaseConfig`] maps collection names to their [`CollectionConfig`];
//! [`CollectionConfig`] is where a collection's schema, persistence, indexes,
//! relationships, and migrations are declared.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;

use crate::codec::Format;
use crate::error::ValidationError;
use crate::migration::MigrationStep;
use crate::relationship::RelationshipConfig;
use crate::schema::CollectionSchema;

/// Top-level database configuration: one entry per collection, plus
/// database-wide options.
#[derive(Debug, Default)]
pub struct DatabaseConfig {
    /// Collection name → collection configuration.
    pub collections: IndexMap<String, CollectionConfig>,

    /// Debounce interval for the write coalescer (default 100 ms).
    pub write_debounce: Duration,

    /// When `true`, mutation methods propagate errors directly (the
    /// default library behavior). When `false`, callers are expected to use
    /// the result-typed accessors — ProseQL's public API is always
    /// `Result`-typed regardless, so this only affects whether `Database`
    /// logs or also returns on coalescer-observed failures.
    pub throw_on_error: bool,

    /// Root directory for collection files resolved by relative path, when
    /// using [`crate::storage::FilesystemAdapter`]. Ignored for the
    /// in-memory adapter.
    pub root_dir: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Creates an empty configuration with default debounce and a fresh collection map.
    pub fn new() -> Self {
        Self {
            collections: IndexMap::new(),
            write_debounce: default_write_debounce(),
            throw_on_error: false,
            root_dir: None,
        }
    }

    /// Registers a collection, returning `self` for chaining.
    pub fn collection(mut self, name: impl Into<String>, config: CollectionConfig) -> Self {
        self.collections.insert(name.into(), config);
        self
    }

    /// Validates every collection's migration registry (spec.md §4.9).
    ///
    /// Called eagerly by [`crate::Database::open`]; fails fast on the first
    /// invalid registry encountered (collections are validated in
    /// declaration order), exactly as spec.md §7 requires: "Validation
    /// errors in registry construction fail the database open with the
    /// first error; no partial facade is exposed."
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, config) in &self.collections {
            config
                .migrations_chain()
                .validate()
                .map_err(|e| ValidationError::invalid_query(format!("{name}: {e}")))?;
        }
        Ok(())
    }
}

fn default_write_debounce() -> Duration {
    Duration::from_millis(100)
}

/// A single-field or compound secondary index declaration.
#[derive(Clone, Debug)]
pub struct IndexSpec {
    /// Field names, in tuple order for compound indexes.
    pub fields: Vec<String>,
}

impl IndexSpec {
    /// Creates a single-field index.
    pub fn on(field: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
        }
    }

    /// Creates a compound index over an ordered field tuple.
    pub fn on_fields(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

/// Declares which string fields are tokenized for `$search`.
#[derive(Clone, Debug, Default)]
pub struct SearchIndexConfig {
    /// Fields considered by `$search` when no explicit `fields` are given.
    pub fields: Vec<String>,
}

/// Per-collection configuration.
#[derive(Clone, Debug)]
pub struct CollectionConfig {
    /// Structural schema for this collection's entities.
    pub schema: CollectionSchema,
    /// On-disk file path, relative to the database's root directory.
    pub file: Option<PathBuf>,
    /// Explicit format override (otherwise resolved from the file extension).
    pub format: Option<Format>,
    /// Secondary indexes.
    pub indexes: Vec<IndexSpec>,
    /// Unique constraints (single field or field tuple).
    pub unique_fields: Vec<Vec<String>>,
    /// `$search` configuration.
    pub search_index: Option<SearchIndexConfig>,
    /// Declared schema version (0 = unversioned).
    pub version: u32,
    /// Ordered migration chain lifting raw data from version 0 to `version`.
    pub migrations: Vec<MigrationStep>,
    /// Marks the collection append-only (reserved for storage adapters with
    /// an `append` fast path; the core pipeline always does whole-file saves).
    pub append_only: bool,
    /// Relationship declarations, keyed by relationship name.
    pub relationships: IndexMap<String, RelationshipConfig>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            schema: CollectionSchema::new(),
            file: None,
            format: None,
            indexes: Vec::new(),
            unique_fields: Vec::new(),
            search_index: None,
            version: 0,
            migrations: Vec::new(),
            append_only: false,
            relationships: IndexMap::new(),
        }
    }
}

impl CollectionConfig {
    /// Creates a new configuration for the given schema.
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            ..Default::default()
        }
    }

    /// Sets the on-disk file path.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Overrides the codec format independent of the file extension.
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Adds a secondary index.
    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes.push(spec);
        self
    }

    /// Declares a unique constraint over a field (or field tuple).
    pub fn unique(mut self, fields: Vec<String>) -> Self {
        self.unique_fields.push(fields);
        self
    }

    /// Sets the `$search` configuration.
    pub fn search_index(mut self, config: SearchIndexConfig) -> Self {
        self.search_index = Some(config);
        self
    }

    /// Declares the schema version and migration chain.
    pub fn versioned(mut self, version: u32, migrations: Vec<MigrationStep>) -> Self {
        self.version = version;
        self.migrations = migrations;
        self
    }

    /// Declares a relationship.
    pub fn relationship(mut self, name: impl Into<String>, config: RelationshipConfig) -> Self {
        self.relationships.insert(name.into(), config);
        self
    }

    pub(crate) fn migrations_chain(&self) -> crate::migration::MigrationChain<'_> {
        crate::migration::MigrationChain {
            version: self.version,
            steps: &self.migrations,
        }
    }
}
