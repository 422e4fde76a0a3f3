//! Per-collection entity store (C5): identity map, secondary indexes, and
//! unique constraints, swapped atomically on every mutation.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     EntityStore                            │
//! │   RwLock<Arc<EntityMapState>>                               │
//! │        │                                                    │
//! │        ▼ snapshot() clones the Arc (cheap, lock-free reads) │
//! │   EntityMapState { entities, indexes, unique }               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations (in `crud.rs`) never edit a state in place: they read a
//! snapshot, compute a full replacement [`EntityMapState`] via
//! [`EntityStore::build_state`], and only then take the write lock to swap
//! it in. This keeps concurrent readers wait-free and makes every mutation
//! atomic: either the whole next state is installed, or none of it is.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::config::CollectionConfig;
use crate::error::{DuplicateKeyError, ProseQLError, Result};
use crate::value::{Record, Value};

/// Canonical encoding of a value for use as an index/unique-constraint key.
/// Tags the value's type so `"1"` (string) and `1` (number) never collide.
fn encode_key_part(value: &Value) -> String {
    match value {
        Value::Null => "n:".to_string(),
        Value::Bool(b) => format!("b:{b}"),
        Value::Number(n) => format!("f:{n}"),
        Value::String(s) => format!("s:{s}"),
        Value::List(_) | Value::Map(_) => format!("x:{}", value.to_display_string()),
    }
}

/// Encodes an ordered tuple of field values into one index key.
pub fn encode_tuple_key(values: &[&Value]) -> String {
    values
        .iter()
        .map(|v| encode_key_part(v))
        .collect::<Vec<_>>()
        .join("\u{1}")
}

/// Reads an ordered tuple of field values off a record, defaulting missing
/// fields to `Value::Null`.
pub fn tuple_values<'a>(record: &'a Record, fields: &[String]) -> Vec<&'a Value> {
    fields.iter().map(|f| record.get(f).unwrap_or(&Value::Null)).collect()
}

/// An immutable snapshot of one collection's identity map plus derived
/// indexes. Cheaply shared via `Arc`; never mutated once built.
#[derive(Debug, Default)]
pub struct EntityMapState {
    /// id → entity, in insertion order.
    pub entities: IndexMap<String, Record>,
    /// One inverted index per declared `IndexSpec`, keyed by the spec's
    /// field tuple (joined with `\u{1}`) → encoded value → matching ids.
    pub indexes: HashMap<String, HashMap<String, Vec<String>>>,
    /// One unique-constraint map per declared field tuple → encoded value → id.
    pub unique: HashMap<String, HashMap<String, String>>,
}

impl EntityMapState {
    /// Looks up a live entity by id.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.entities.get(id)
    }
}

/// Owns one collection's atomically-swapped [`EntityMapState`].
pub struct EntityStore {
    state: RwLock<Arc<EntityMapState>>,
}

impl EntityStore {
    /// Creates an empty store.
    pub fn empty() -> Self {
        Self {
            state: RwLock::new(Arc::new(EntityMapState::default())),
        }
    }

    /// Returns a cheap `Arc` clone of the current state.
    pub fn snapshot(&self) -> Arc<EntityMapState> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Installs a freshly built state, replacing the current one.
    pub fn swap(&self, next: EntityMapState) {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(next);
    }

    /// Builds a full [`EntityMapState`] from a candidate entity map,
    /// rebuilding every secondary index and unique-constraint map and
    /// failing on the first in-collection unique collision found.
    ///
    /// This does not check `ref` foreign-key integrity; that crosses
    /// collection boundaries and is the caller's responsibility (`crud.rs`).
    pub fn build_state(
        collection: &str,
        config: &CollectionConfig,
        entities: IndexMap<String, Record>,
    ) -> Result<EntityMapState> {
        let mut indexes: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
        for spec in &config.indexes {
            let key = spec.fields.join("\u{1}");
            let mut inverted: HashMap<String, Vec<String>> = HashMap::new();
            for (id, record) in &entities {
                let tuple = tuple_values(record, &spec.fields);
                inverted.entry(encode_tuple_key(&tuple)).or_default().push(id.clone());
            }
            indexes.insert(key, inverted);
        }

        let mut unique: HashMap<String, HashMap<String, String>> = HashMap::new();
        for fields in &config.unique_fields {
            let key = fields.join("\u{1}");
            let mut map: HashMap<String, String> = HashMap::new();
            for (id, record) in &entities {
                if is_soft_deleted(record) {
                    continue;
                }
                let tuple = tuple_values(record, fields);
                let encoded = encode_tuple_key(&tuple);
                if let Some(existing) = map.get(&encoded) {
                    if existing != id {
                        let value = tuple.iter().map(|v| v.to_display_string()).collect();
                        return Err(ProseQLError::DuplicateKey(DuplicateKeyError::new(
                            collection,
                            fields.clone(),
                            value,
                        )));
                    }
                }
                map.insert(encoded, id.clone());
            }
            unique.insert(key, map);
        }

        Ok(EntityMapState {
            entities,
            indexes,
            unique,
        })
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::empty()
    }
}

/// True when the record declares a non-null `deletedAt` (soft-deleted).
pub fn is_soft_deleted(record: &Record) -> bool {
    record.get("deletedAt").is_some_and(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectionConfig, IndexSpec};
    use crate::schema::CollectionSchema;

    fn rec(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_build_state_indexes_by_field() {
        let config = CollectionConfig::new(CollectionSchema::new()).index(IndexSpec::on("year"));
        let mut entities = IndexMap::new();
        entities.insert("1".to_string(), rec(&[("id", Value::from("1")), ("year", Value::from(2000.0))]));
        entities.insert("2".to_string(), rec(&[("id", Value::from("2")), ("year", Value::from(2000.0))]));
        let state = EntityStore::build_state("books", &config, entities).unwrap();
        let idx = state.indexes.get("year").unwrap();
        let key = encode_tuple_key(&[&Value::from(2000.0)]);
        assert_eq!(idx.get(&key).unwrap().len(), 2);
    }

    #[test]
    fn test_build_state_rejects_duplicate_unique_value() {
        let config = CollectionConfig::new(CollectionSchema::new()).unique(vec!["email".to_string()]);
        let mut entities = IndexMap::new();
        entities.insert("1".to_string(), rec(&[("id", Value::from("1")), ("email", Value::from("a@b"))]));
        entities.insert("2".to_string(), rec(&[("id", Value::from("2")), ("email", Value::from("a@b"))]));
        let err = EntityStore::build_state("users", &config, entities).unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[test]
    fn test_soft_deleted_excluded_from_unique_check() {
        let config = CollectionConfig::new(CollectionSchema::new()).unique(vec!["email".to_string()]);
        let mut entities = IndexMap::new();
        entities.insert(
            "1".to_string(),
            rec(&[("id", Value::from("1")), ("email", Value::from("a@b")), ("deletedAt", Value::from("now"))]),
        );
        entities.insert("2".to_string(), rec(&[("id", Value::from("2")), ("email", Value::from("a@b"))]));
        assert!(EntityStore::build_state("users", &config, entities).is_ok());
    }

    #[test]
    fn test_snapshot_swap_round_trips() {
        let store = EntityStore::empty();
        assert!(store.snapshot().entities.is_empty());
        let mut entities = IndexMap::new();
        entities.insert("1".to_string(), rec(&[("id", Value::from("1"))]));
        let config = CollectionConfig::new(CollectionSchema::new());
        let state = EntityStore::build_state("x", &config, entities).unwrap();
        store.swap(state);
        assert_eq!(store.snapshot().entities.len(), 1);
    }
}
