//! Persistence pipeline (C3): load/save a collection's file through the
//! codec registry, with version stamping and migration-on-load.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info, instrument};

use crate::codec::{CodecRegistry, Format};
use crate::config::CollectionConfig;
use crate::error::{MigrationError, ProseQLError, Result};
use crate::migration::RawCollection;
use crate::value::{Record, Value};

fn resolve_format(config: &CollectionConfig, registry: &CodecRegistry, path: &Path) -> Result<Format> {
    if let Some(format) = config.format {
        return Ok(format);
    }
    Ok(registry.resolve_path(path)?)
}

/// Serializes the current entity map to text, prepending a `_version` entry
/// when the collection is versioned (spec.md §4.3 step 1-2).
pub fn encode_snapshot(
    config: &CollectionConfig,
    registry: &CodecRegistry,
    path: &Path,
    entities: &IndexMap<String, Record>,
) -> Result<String> {
    let format = resolve_format(config, registry, path)?;
    let mut map = Record::new();
    if config.version > 0 {
        map.insert("_version".to_string(), Value::from(config.version as i64));
    }
    for (id, record) in entities {
        map.insert(id.clone(), Value::Map(record.clone()));
    }
    Ok(registry.encode(format, &Value::Map(map))?)
}

/// Writes a collection's current state to its configured storage path.
#[instrument(skip(config, registry, storage, entities), fields(collection))]
pub fn save(
    collection: &str,
    config: &CollectionConfig,
    registry: &CodecRegistry,
    storage: &dyn crate::storage::StorageAdapter,
    entities: &IndexMap<String, Record>,
) -> Result<()> {
    let path = config
        .file
        .as_deref()
        .ok_or_else(|| ProseQLError::operation(format!("{collection}: no file configured")))?;
    let text = encode_snapshot(config, registry, path, entities)?;
    storage.write(path, &text)?;
    debug!(collection, entities = entities.len(), "saved collection");
    Ok(())
}

/// The result of loading one collection's file: its raw, schema-validated
/// entity map and the version it was stamped with after migration.
pub struct LoadedCollection {
    /// Validated entities, id → fields (defaults applied).
    pub entities: IndexMap<String, Record>,
}

/// Loads, migrates, and schema-validates a collection's file (spec.md §4.3).
///
/// Returns an empty collection if the file does not exist yet, matching the
/// facade's "starts empty" behavior for a fresh database.
#[instrument(skip(config, registry, storage), fields(collection))]
pub fn load(
    collection: &str,
    config: &CollectionConfig,
    registry: &CodecRegistry,
    storage: &dyn crate::storage::StorageAdapter,
) -> Result<LoadedCollection> {
    let Some(path) = config.file.as_deref() else {
        return Ok(LoadedCollection {
            entities: IndexMap::new(),
        });
    };

    if !storage.exists(path)? {
        info!(collection, "no existing file, starting empty");
        return Ok(LoadedCollection {
            entities: IndexMap::new(),
        });
    }

    let format = resolve_format(config, registry, path)?;
    let text = storage.read(path)?;
    let decoded = registry.decode(format, &text)?;
    let map = decoded
        .as_map()
        .ok_or_else(|| ProseQLError::operation(format!("{collection}: decoded file is not a mapping")))?
        .clone();

    let mut raw: RawCollection = RawCollection::new();
    let mut file_version: u32 = 0;
    for (key, value) in map {
        if key == "_version" {
            file_version = value.as_f64().unwrap_or(0.0) as u32;
            continue;
        }
        let record = value
            .as_map()
            .ok_or_else(|| ProseQLError::operation(format!("{collection}: entity '{key}' is not a mapping")))?
            .clone();
        raw.insert(key, record);
    }

    if file_version > config.version {
        return Err(MigrationError::VersionAhead {
            declared: config.version,
            found: file_version,
        }
        .into());
    }

    let chain = config.migrations_chain();
    let migrated = if file_version < config.version {
        info!(collection, from = file_version, to = config.version, "running migrations");
        chain.run(file_version, raw)?
    } else {
        raw
    };

    let mut entities = IndexMap::new();
    for (id, record) in migrated {
        let validated = config.schema.validate(&record)?;
        entities.insert(id, validated);
    }

    Ok(LoadedCollection { entities })
}
