//! Error types for ProseQL.
//!
//! ProseQL uses a hierarchical error system:
//! - `ProseQLError` is the top-level error returned by all public APIs
//! - Specific error types provide structured detail for each failure mode
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use proseql::{Database, DatabaseConfig, Result};
//!
//! fn example() -> Result<()> {
//!     let db = Database::open(DatabaseConfig::default())?;
//!     // ... operations that may fail ...
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ProseQL operations.
pub type Result<T> = std::result::Result<T, ProseQLError>;

/// Top-level error enum for all ProseQL operations.
///
/// This is the only error type returned by public APIs. Use pattern
/// matching, or the `is_*` helpers, to handle specific error cases.
#[derive(Debug, Error)]
pub enum ProseQLError {
    /// Input fails schema validation, or options are ill-formed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Id lookup failed.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// A unique constraint (or the id itself) collided with an existing entity.
    #[error("{0}")]
    DuplicateKey(#[from] DuplicateKeyError),

    /// A `ref` foreign key does not resolve, or a restricted delete is blocked.
    #[error("{0}")]
    ForeignKey(#[from] ForeignKeyError),

    /// `populate` could not resolve a reference and `optional` was not set.
    #[error("{0}")]
    DanglingReference(#[from] DanglingReferenceError),

    /// An invariant violation not covered by a more specific variant.
    #[error("Operation error: {0}")]
    Operation(String),

    /// Storage adapter I/O failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Codec encode/decode failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// No codec registered for a file extension.
    #[error("{0}")]
    UnsupportedFormat(#[from] UnsupportedFormatError),

    /// Migration registry validation or application failure.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl ProseQLError {
    /// Creates an operation error with the given message.
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a duplicate-key error.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }

    /// Returns true if this is a foreign-key error.
    pub fn is_foreign_key(&self) -> bool {
        matches!(self, Self::ForeignKey(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a migration error.
    pub fn is_migration(&self) -> bool {
        matches!(self, Self::Migration(_))
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field's value does not satisfy the collection schema.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A required field is missing.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// Query options are mutually exclusive or otherwise ill-formed.
    #[error("Invalid query options: {reason}")]
    InvalidQuery {
        /// Description of the problem.
        reason: String,
    },

    /// Schema validation produced one or more field-level issues.
    #[error("{} schema issue(s): {}", issues.len(), issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; "))]
    Schema {
        /// Individual field issues.
        issues: Vec<SchemaIssue>,
    },
}

impl ValidationError {
    /// Creates an invalid-field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a required-field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates an invalid-query error.
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }
}

/// A single field-level schema validation issue.
#[derive(Debug, Clone, Error)]
#[error("field '{field}': {reason}")]
pub struct SchemaIssue {
    /// Dotted path to the offending field.
    pub field: String,
    /// Human-readable description of the mismatch.
    pub reason: String,
}

impl SchemaIssue {
    /// Creates a new schema issue.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Entity-not-found errors, scoped by collection.
#[derive(Debug, Error)]
#[error("{collection}: entity not found: {id}")]
pub struct NotFoundError {
    /// Collection name.
    pub collection: String,
    /// Id that was not found.
    pub id: String,
}

impl NotFoundError {
    /// Creates a new not-found error.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Unique-constraint or id collision.
#[derive(Debug, Error)]
#[error("{collection}: duplicate key on {fields:?} = {value:?}")]
pub struct DuplicateKeyError {
    /// Collection name.
    pub collection: String,
    /// Field (or field tuple) the constraint is declared on.
    pub fields: Vec<String>,
    /// The colliding value(s), in field order.
    pub value: Vec<String>,
}

impl DuplicateKeyError {
    /// Creates a new duplicate-key error.
    pub fn new(collection: impl Into<String>, fields: Vec<String>, value: Vec<String>) -> Self {
        Self {
            collection: collection.into(),
            fields,
            value,
        }
    }
}

/// `ref` foreign-key integrity violation on mutate, or a restricted delete.
#[derive(Debug, Error)]
#[error("{collection}.{relation}: foreign key violation for id {id}")]
pub struct ForeignKeyError {
    /// Collection the relation is declared on.
    pub collection: String,
    /// Relation name.
    pub relation: String,
    /// The offending id (either the missing target, or the restricted source).
    pub id: String,
}

impl ForeignKeyError {
    /// Creates a new foreign-key error.
    pub fn new(
        collection: impl Into<String>,
        relation: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            relation: relation.into(),
            id: id.into(),
        }
    }
}

/// `populate` could not resolve a `ref` relationship and `optional` was not set.
#[derive(Debug, Error)]
#[error("{collection}.{relation}: dangling reference to {id}")]
pub struct DanglingReferenceError {
    /// Target collection name.
    pub collection: String,
    /// Relation name on the source collection.
    pub relation: String,
    /// The unresolved target id.
    pub id: String,
}

impl DanglingReferenceError {
    /// Creates a new dangling-reference error.
    pub fn new(
        collection: impl Into<String>,
        relation: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            relation: relation.into(),
            id: id.into(),
        }
    }
}

/// Storage adapter I/O failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `read` failed because the key/path does not exist.
    #[error("read failed, key not found: {0}")]
    NotFound(PathBuf),

    /// `write` failed (includes quota violations).
    #[error("write failed at {path}: {cause}")]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying cause.
        cause: String,
    },

    /// `append` failed.
    #[error("append failed at {path}: {cause}")]
    Append {
        /// Target path.
        path: PathBuf,
        /// Underlying cause.
        cause: String,
    },

    /// `exists` failed.
    #[error("exists check failed at {path}: {cause}")]
    Exists {
        /// Target path.
        path: PathBuf,
        /// Underlying cause.
        cause: String,
    },

    /// `remove` failed.
    #[error("remove failed at {path}: {cause}")]
    Remove {
        /// Target path.
        path: PathBuf,
        /// Underlying cause.
        cause: String,
    },

    /// `ensure_dir` failed.
    #[error("ensure_dir failed at {path}: {cause}")]
    EnsureDir {
        /// Target path.
        path: PathBuf,
        /// Underlying cause.
        cause: String,
    },

    /// `watch` failed to register.
    #[error("watch failed at {path}: {cause}")]
    Watch {
        /// Target path.
        path: PathBuf,
        /// Underlying cause.
        cause: String,
    },
}

/// Codec encode/decode failure.
#[derive(Debug, Error)]
#[error("{format} codec error: {cause}")]
pub struct SerializationError {
    /// Format/codec name (e.g. "json", "prose").
    pub format: String,
    /// Underlying cause.
    pub cause: String,
}

impl SerializationError {
    /// Creates a new serialization error.
    pub fn new(format: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            cause: cause.into(),
        }
    }
}

/// No codec registered for a file extension.
#[derive(Debug, Error)]
#[error("unsupported format '.{ext}'; supported: {supported:?}")]
pub struct UnsupportedFormatError {
    /// The unresolved extension.
    pub ext: String,
    /// The set of extensions the registry does know about.
    pub supported: Vec<String>,
}

impl UnsupportedFormatError {
    /// Creates a new unsupported-format error.
    pub fn new(ext: impl Into<String>, supported: Vec<String>) -> Self {
        Self {
            ext: ext.into(),
            supported,
        }
    }
}

/// Migration registry validation or application failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// The on-disk version exceeds the collection's declared version.
    #[error("file version {found} is ahead of declared version {declared}")]
    VersionAhead {
        /// Declared collection version.
        declared: u32,
        /// Version found in the file's `_version` marker.
        found: u32,
    },

    /// The chain's `from` values leave a gap in `[0, version)`.
    #[error("migration chain has a gap before reaching version {version}")]
    GapInChain {
        /// Declared collection version.
        version: u32,
    },

    /// The chain does not start at 0.
    #[error("migration chain does not cover the start of the range (missing `from: 0`)")]
    MissingStart,

    /// The chain's final `to` does not equal the declared version.
    #[error("migration chain ends at {chain_end} but declared version is {declared}")]
    VersionMismatch {
        /// Declared collection version.
        declared: u32,
        /// The final `to` of the sorted chain.
        chain_end: u32,
    },

    /// Two migrations share the same `from`.
    #[error("duplicate migration step with from = {from}")]
    DuplicateFrom {
        /// The duplicated `from` version.
        from: u32,
    },

    /// A migration's `to` is not `from + 1`.
    #[error("invalid migration step: from {from} to {to} (must be from + 1)")]
    InvalidIncrement {
        /// The step's `from`.
        from: u32,
        /// The step's `to`.
        to: u32,
    },

    /// `version > 0` but no migrations were declared.
    #[error("version {version} declared with an empty migration registry")]
    EmptyRegistry {
        /// Declared collection version.
        version: u32,
    },

    /// `version == 0` (unversioned) but migrations were declared anyway.
    #[error("collection is unversioned (version 0) but declares {step_count} migration step(s)")]
    UnversionedWithMigrations {
        /// Number of migration steps declared.
        step_count: usize,
    },

    /// A transform function returned an error while applying a migration.
    #[error("migration from {from} to {to} failed: {cause}")]
    TransformFailed {
        /// The step's `from`.
        from: u32,
        /// The step's `to`.
        to: u32,
        /// Underlying cause.
        cause: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = NotFoundError::new("books", "1");
        assert_eq!(err.to_string(), "books: entity not found: 1");
    }

    #[test]
    fn test_duplicate_key_display() {
        let err = DuplicateKeyError::new("users", vec!["email".into()], vec!["a@b".into()]);
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_is_not_found() {
        let err: ProseQLError = NotFoundError::new("books", "1").into();
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_is_validation() {
        let err: ProseQLError = ValidationError::required_field("title").into();
        assert!(err.is_validation());
    }

    #[test]
    fn test_migration_error_display() {
        let err = MigrationError::VersionAhead {
            declared: 2,
            found: 3,
        };
        assert!(err.to_string().contains("ahead"));
    }

    #[test]
    fn test_error_conversion_chain() {
        fn inner() -> Result<()> {
            Err(StorageError::NotFound(PathBuf::from("x.json")))?
        }
        let result = inner();
        assert!(result.is_err());
        assert!(result.unwrap_err().is_storage());
    }
}
