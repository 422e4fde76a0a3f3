//! CRUD operations (C7): create/update/delete/upsert, their *-Many variants,
//! and relationship-aware mutations with connect/create/disconnect/set
//! directives and cascading deletes.
//!
//! Every mutation computes a full candidate entity map and swaps it in via
//! [`crate::store::EntityStore::swap`] only after every invariant holds —
//! so a rejected mutation leaves the previous state untouched (spec.md §4.7:
//! "either the new state satisfies all invariants and is swapped in, or the
//! previous state is preserved").

use indexmap::IndexMap;
use tracing::{info, instrument};

use crate::db::Database;
use crate::error::{
    DuplicateKeyError, ForeignKeyError, NotFoundError, ProseQLError, Result, ValidationError,
};
use crate::query::Expr;
use crate::relationship::{OnDelete, RelationshipKind};
use crate::store::{is_soft_deleted, EntityStore};
use crate::types::{generate_id, Timestamp};
use crate::value::{Record, Value};

/// A single field-level update operator (spec.md §4.7).
#[derive(Clone, Debug)]
pub enum FieldUpdate {
    Set(Value),
    Inc(f64),
    Mul(f64),
    Push(Value),
    Pull(Value),
    Unset,
}

/// An `update`/`updateMany` request body: field → operator.
pub type UpdateSet = IndexMap<String, FieldUpdate>;

/// Options accepted by `createMany`.
#[derive(Clone, Debug, Default)]
pub struct CreateManyOptions {
    pub skip_duplicates: bool,
}

/// Outcome of `createMany`.
#[derive(Debug, Default)]
pub struct CreateManyResult {
    pub created: Vec<Record>,
    pub count: usize,
}

/// One collection's cascade outcome from a delete.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CascadeInfo {
    pub count: usize,
    pub ids: Vec<String>,
}

/// Outcome of `delete`/`deleteMany`.
#[derive(Debug, Default)]
pub struct DeleteResult {
    pub deleted: Vec<Record>,
    pub cascaded: IndexMap<String, CascadeInfo>,
}

/// Outcome of `upsert`.
#[derive(Debug)]
pub struct UpsertResult {
    pub operation: UpsertOperation,
    pub entity: Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOperation {
    Created,
    Updated,
}

/// A directive attached to one relationship name in a `*WithRelationships` call.
#[derive(Clone, Debug)]
pub enum RelDirective {
    Connect { id: String },
    Create(Record),
    Disconnect,
    Set(Vec<String>),
}

pub type RelDirectives = IndexMap<String, RelDirective>;

fn apply_field_update(record: &mut Record, field: &str, op: &FieldUpdate) -> Result<()> {
    match op {
        FieldUpdate::Set(value) => {
            record.insert(field.to_string(), value.clone());
        }
        FieldUpdate::Inc(delta) => {
            let current = record.get(field).and_then(Value::as_f64).unwrap_or(0.0);
            record.insert(field.to_string(), Value::from(current + delta));
        }
        FieldUpdate::Mul(factor) => {
            let current = record.get(field).and_then(Value::as_f64).unwrap_or(0.0);
            record.insert(field.to_string(), Value::from(current * factor));
        }
        FieldUpdate::Push(item) => {
            let mut list = record.get(field).and_then(Value::as_list).map(|s| s.to_vec()).unwrap_or_default();
            list.push(item.clone());
            record.insert(field.to_string(), Value::List(list));
        }
        FieldUpdate::Pull(item) => {
            let list = record.get(field).and_then(Value::as_list).map(|s| s.to_vec()).unwrap_or_default();
            let filtered: Vec<Value> = list.into_iter().filter(|v| !v.loose_eq(item)).collect();
            record.insert(field.to_string(), Value::List(filtered));
        }
        FieldUpdate::Unset => {
            record.shift_remove(field);
        }
    }
    Ok(())
}

fn apply_updates(record: &mut Record, updates: &UpdateSet) -> Result<()> {
    for (field, op) in updates {
        apply_field_update(record, field, op)?;
    }
    Ok(())
}

fn stamp_timestamps(db: &Database, collection: &str, record: &mut Record, creating: bool) -> Result<()> {
    let config = db.config(collection)?;
    let now = Timestamp::now();
    if creating && config.schema.fields.iter().any(|f| f.name == "createdAt") && !record.contains_key("createdAt") {
        record.insert("createdAt".to_string(), Value::from(now.clone()));
    }
    if config.schema.fields.iter().any(|f| f.name == "updatedAt") {
        record.insert("updatedAt".to_string(), Value::from(now));
    }
    Ok(())
}

fn check_foreign_keys(db: &Database, collection: &str, record: &Record) -> Result<()> {
    let Some(relationships) = db.relationships_of(collection) else {
        return Ok(());
    };
    for (name, rel) in relationships {
        if let RelationshipKind::Ref { target, foreign_key, .. } = &rel.kind {
            let Some(value) = record.get(foreign_key) else { continue };
            if value.is_null() {
                continue;
            }
            let id = value.to_display_string();
            let snapshot = db.snapshot(target)?;
            if snapshot.get(&id).is_none() {
                return Err(ForeignKeyError::new(collection, name.clone(), id).into());
            }
        }
    }
    Ok(())
}

/// Validates, stamps timestamps, rebuilds the store's candidate state, and
/// swaps it in. Shared by `create` and the bulk variants.
fn finalize_insert(db: &Database, collection: &str, mut record: Record, creating: bool) -> Result<Record> {
    stamp_timestamps(db, collection, &mut record, creating)?;
    let config = db.config(collection)?;
    let validated = config.schema.validate(&record)?;
    check_foreign_keys(db, collection, &validated)?;

    let store = db.store(collection)?;
    let snapshot = store.snapshot();
    let id = validated.get("id").unwrap().to_display_string();
    if snapshot.entities.contains_key(&id) {
        return Err(DuplicateKeyError::new(collection, vec!["id".to_string()], vec![id]).into());
    }
    let mut entities = snapshot.entities.clone();
    entities.insert(id, validated.clone());
    let next_state = EntityStore::build_state(collection, config, entities)?;
    store.swap(next_state);
    db.after_mutation(collection);
    Ok(validated)
}

/// `create(input)` (spec.md §4.7).
#[instrument(skip(db, input), fields(collection))]
pub fn create(db: &Database, collection: &str, mut input: Record) -> Result<Record> {
    if !input.contains_key("id") || input.get("id").is_some_and(Value::is_null) {
        input.insert("id".to_string(), Value::from(generate_id()));
    }
    finalize_insert(db, collection, input, true)
}

/// `createMany(inputs, options)`.
pub fn create_many(
    db: &Database,
    collection: &str,
    inputs: Vec<Record>,
    options: &CreateManyOptions,
) -> Result<CreateManyResult> {
    let mut created = Vec::with_capacity(inputs.len());
    for mut input in inputs {
        if !input.contains_key("id") || input.get("id").is_some_and(Value::is_null) {
            input.insert("id".to_string(), Value::from(generate_id()));
        }
        match finalize_insert(db, collection, input, true) {
            Ok(record) => created.push(record),
            Err(ProseQLError::DuplicateKey(_)) if options.skip_duplicates => continue,
            Err(e) => return Err(e),
        }
    }
    let count = created.len();
    Ok(CreateManyResult { created, count })
}

/// `update(id, updates)`.
#[instrument(skip(db, updates), fields(collection, id))]
pub fn update(db: &Database, collection: &str, id: &str, updates: &UpdateSet) -> Result<Record> {
    let store = db.store(collection)?;
    let snapshot = store.snapshot();
    let mut record = snapshot
        .get(id)
        .cloned()
        .ok_or_else(|| NotFoundError::new(collection, id))?;
    apply_updates(&mut record, updates)?;
    stamp_timestamps(db, collection, &mut record, false)?;

    let config = db.config(collection)?;
    let validated = config.schema.validate(&record)?;
    check_foreign_keys(db, collection, &validated)?;

    let mut entities = snapshot.entities.clone();
    entities.insert(id.to_string(), validated.clone());
    let next_state = EntityStore::build_state(collection, config, entities)?;
    store.swap(next_state);
    db.after_mutation(collection);
    Ok(validated)
}

/// `updateMany(predicate, updates)`, applied atomically across the collection.
pub fn update_many(
    db: &Database,
    collection: &str,
    predicate: &Expr,
    updates: &UpdateSet,
) -> Result<Vec<Record>> {
    let store = db.store(collection)?;
    let snapshot = store.snapshot();
    let config = db.config(collection)?;
    let search_fields = db.default_search_fields(collection);

    let mut entities = snapshot.entities.clone();
    let mut changed = Vec::new();
    for (id, record) in snapshot.entities.iter() {
        if !predicate.evaluate(record, &search_fields)? {
            continue;
        }
        let mut updated = record.clone();
        apply_updates(&mut updated, updates)?;
        stamp_timestamps(db, collection, &mut updated, false)?;
        let validated = config.schema.validate(&updated)?;
        check_foreign_keys(db, collection, &validated)?;
        entities.insert(id.clone(), validated.clone());
        changed.push(validated);
    }

    let next_state = EntityStore::build_state(collection, config, entities)?;
    store.swap(next_state);
    if !changed.is_empty() {
        db.after_mutation(collection);
    }
    Ok(changed)
}

/// Finds every collection with a `ref` relationship targeting `target`.
fn dependents_of<'a>(db: &'a Database, target: &str) -> Vec<(&'a str, &'a str, &'a str, OnDelete)> {
    let mut out = Vec::new();
    for name in db.collection_names() {
        let Some(relationships) = db.relationships_of(name) else { continue };
        for (rel_name, rel) in relationships {
            if let RelationshipKind::Ref { target: t, foreign_key, on_delete } = &rel.kind {
                if t == target {
                    out.push((name, rel_name.as_str(), foreign_key.as_str(), *on_delete));
                }
            }
        }
    }
    out
}

/// Deletes one entity, resolving cascades per spec.md §4.7/§9 (fixpoint over
/// a visited set so cyclic `ref` graphs terminate).
fn delete_one(db: &Database, collection: &str, id: &str, soft: bool) -> Result<DeleteResult> {
    let config = db.config(collection)?;
    let store = db.store(collection)?;
    let snapshot = store.snapshot();
    let record = snapshot
        .get(id)
        .cloned()
        .ok_or_else(|| NotFoundError::new(collection, id))?;

    if soft && config.schema.supports_soft_delete() {
        let mut updates = UpdateSet::new();
        updates.insert("deletedAt".to_string(), FieldUpdate::Set(Value::from(Timestamp::now())));
        let updated = update(db, collection, id, &updates)?;
        return Ok(DeleteResult {
            deleted: vec![updated],
            cascaded: IndexMap::new(),
        });
    }

    let mut visited: IndexMap<String, Vec<String>> = IndexMap::new();
    resolve_cascade(db, collection, &[id.to_string()], &mut visited)?;

    let mut cascaded = IndexMap::new();
    for (dep_collection, ids) in &visited {
        if dep_collection == collection {
            continue;
        }
        let dep_store = db.store(dep_collection)?;
        let dep_config = db.config(dep_collection)?;
        let dep_snapshot = dep_store.snapshot();
        let mut dep_entities = dep_snapshot.entities.clone();
        for dep_id in ids {
            dep_entities.shift_remove(dep_id);
        }
        let next = EntityStore::build_state(dep_collection, dep_config, dep_entities)?;
        dep_store.swap(next);
        db.after_mutation(dep_collection);
        cascaded.insert(dep_collection.clone(), CascadeInfo { count: ids.len(), ids: ids.clone() });
    }

    // setNull dependents: clear the fk field rather than delete.
    for (dep_name, rel_name, foreign_key, on_delete) in dependents_of(db, collection) {
        if on_delete != OnDelete::SetNull {
            continue;
        }
        let dep_store = db.store(dep_name)?;
        let dep_config = db.config(dep_name)?;
        let dep_snapshot = dep_store.snapshot();
        let mut dep_entities = dep_snapshot.entities.clone();
        let mut touched = false;
        for (dep_id, dep_record) in dep_entities.iter_mut() {
            if dep_record.get(foreign_key).map(|v| v.to_display_string()) == Some(id.to_string()) {
                dep_record.insert(foreign_key.to_string(), Value::Null);
                touched = true;
                info!(collection = dep_name, id = dep_id.as_str(), relation = rel_name, "cleared fk on delete");
            }
        }
        if touched {
            let next = EntityStore::build_state(dep_name, dep_config, dep_entities)?;
            dep_store.swap(next);
            db.after_mutation(dep_name);
        }
    }

    let mut entities = snapshot.entities.clone();
    entities.shift_remove(id);
    let next_state = EntityStore::build_state(collection, config, entities)?;
    store.swap(next_state);
    db.after_mutation(collection);

    Ok(DeleteResult {
        deleted: vec![record],
        cascaded,
    })
}

/// Computes the transitive closure of cascade-deleted dependents, erroring
/// if any `restrict` relationship still points at a to-be-deleted id.
fn resolve_cascade(
    db: &Database,
    collection: &str,
    ids: &[String],
    visited: &mut IndexMap<String, Vec<String>>,
) -> Result<()> {
    let entry = visited.entry(collection.to_string()).or_default();
    let mut frontier = Vec::new();
    for id in ids {
        if !entry.contains(id) {
            entry.push(id.clone());
            frontier.push(id.clone());
        }
    }
    if frontier.is_empty() {
        return Ok(());
    }

    for (dep_name, rel_name, foreign_key, on_delete) in dependents_of(db, collection) {
        let dep_snapshot = db.snapshot(dep_name)?;
        let referencing: Vec<String> = dep_snapshot
            .entities
            .iter()
            .filter(|(_, r)| {
                r.get(foreign_key)
                    .map(|v| v.to_display_string())
                    .is_some_and(|fk| frontier.contains(&fk))
            })
            .map(|(id, _)| id.clone())
            .collect();

        if referencing.is_empty() {
            continue;
        }

        match on_delete {
            OnDelete::Restrict => {
                return Err(ForeignKeyError::new(dep_name, rel_name, referencing[0].clone()).into());
            }
            OnDelete::Cascade => {
                resolve_cascade(db, dep_name, &referencing, visited)?;
            }
            OnDelete::SetNull => {
                // handled separately in delete_one after the delete completes.
            }
        }
    }
    Ok(())
}

/// `delete(id, options)`.
pub fn delete(db: &Database, collection: &str, id: &str, soft: bool) -> Result<DeleteResult> {
    delete_one(db, collection, id, soft)
}

/// `deleteMany(predicate, options)`.
pub fn delete_many(
    db: &Database,
    collection: &str,
    predicate: &Expr,
    soft: bool,
    limit: Option<usize>,
) -> Result<DeleteResult> {
    let snapshot = db.snapshot(collection)?;
    let search_fields = db.default_search_fields(collection);
    let mut ids: Vec<String> = Vec::new();
    for (id, record) in snapshot.entities.iter() {
        if is_soft_deleted(record) && !soft {
            continue;
        }
        if predicate.evaluate(record, &search_fields)? {
            ids.push(id.clone());
        }
        if limit.is_some_and(|l| ids.len() >= l) {
            break;
        }
    }

    let mut combined = DeleteResult::default();
    for id in ids {
        let result = delete_one(db, collection, &id, soft)?;
        combined.deleted.extend(result.deleted);
        for (dep, info) in result.cascaded {
            let entry = combined.cascaded.entry(dep).or_insert_with(CascadeInfo::default);
            entry.count += info.count;
            entry.ids.extend(info.ids);
        }
    }
    Ok(combined)
}

/// `upsert(input)`, keyed by id when present, else by the collection's
/// first declared unique-constraint tuple, else always a fresh create.
pub fn upsert(db: &Database, collection: &str, input: Record) -> Result<UpsertResult> {
    let config = db.config(collection)?;
    let store = db.store(collection)?;
    let snapshot = store.snapshot();

    let existing_id = if let Some(id_value) = input.get("id").filter(|v| !v.is_null()) {
        let id = id_value.to_display_string();
        snapshot.get(&id).is_some().then_some(id)
    } else if let Some(fields) = config.unique_fields.first() {
        let tuple = crate::store::tuple_values(&input, fields);
        if tuple.iter().any(|v| v.is_null()) {
            None
        } else {
            let key = crate::store::encode_tuple_key(&tuple);
            snapshot.unique.get(&fields.join("\u{1}")).and_then(|m| m.get(&key)).cloned()
        }
    } else {
        None
    };

    match existing_id {
        Some(id) => {
            let updates: UpdateSet = input
                .into_iter()
                .filter(|(k, _)| k != "id")
                .map(|(k, v)| (k, FieldUpdate::Set(v)))
                .collect();
            let entity = update(db, collection, &id, &updates)?;
            Ok(UpsertResult { operation: UpsertOperation::Updated, entity })
        }
        None => {
            let entity = create(db, collection, input)?;
            Ok(UpsertResult { operation: UpsertOperation::Created, entity })
        }
    }
}

/// `upsertMany`.
pub fn upsert_many(db: &Database, collection: &str, inputs: Vec<Record>) -> Result<Vec<UpsertResult>> {
    inputs.into_iter().map(|input| upsert(db, collection, input)).collect()
}

/// Resolves one relationship directive, mutating `input` (for `ref`
/// connect/create/disconnect) or applying the side effect directly to the
/// target collection (for `inverse` set/connect/disconnect), before the
/// owning entity is created or updated.
fn apply_rel_directive(db: &Database, collection: &str, input: &mut Record, own_id: Option<&str>, name: &str, directive: &RelDirective) -> Result<()> {
    let relationships = db
        .relationships_of(collection)
        .ok_or_else(|| ProseQLError::operation(format!("{collection}: no relationships declared")))?;
    let rel = relationships
        .get(name)
        .ok_or_else(|| ProseQLError::operation(format!("{collection}: no relationship named '{name}'")))?
        .clone();

    match &rel.kind {
        RelationshipKind::Ref { target, foreign_key, .. } => match directive {
            RelDirective::Connect { id } => {
                input.insert(foreign_key.clone(), Value::from(id.clone()));
            }
            RelDirective::Create(fields) => {
                let created = create(db, target, fields.clone())?;
                let id = created.get("id").unwrap().to_display_string();
                input.insert(foreign_key.clone(), Value::from(id));
            }
            RelDirective::Disconnect => {
                input.insert(foreign_key.clone(), Value::Null);
            }
            RelDirective::Set(_) => {
                return Err(ValidationError::invalid_query(format!("'{name}' is a ref relationship; use connect/create/disconnect")).into());
            }
        },
        RelationshipKind::Inverse { target, foreign_key } => {
            let Some(this_id) = own_id else {
                return Err(ValidationError::invalid_query("inverse relationship directives require an existing id").into());
            };
            match directive {
                RelDirective::Set(ids) => {
                    let target_snapshot = db.snapshot(target)?;
                    let mut updates_fk = UpdateSet::new();
                    updates_fk.insert(foreign_key.clone(), FieldUpdate::Set(Value::from(this_id.to_string())));
                    for id in ids {
                        update(db, target, id, &updates_fk)?;
                    }
                    let mut clear_fk = UpdateSet::new();
                    clear_fk.insert(foreign_key.clone(), FieldUpdate::Set(Value::Null));
                    for (tid, trecord) in target_snapshot.entities.iter() {
                        if trecord.get(foreign_key).map(|v| v.to_display_string()) == Some(this_id.to_string()) && !ids.contains(tid) {
                            update(db, target, tid, &clear_fk)?;
                        }
                    }
                }
                RelDirective::Connect { id } => {
                    let mut updates_fk = UpdateSet::new();
                    updates_fk.insert(foreign_key.clone(), FieldUpdate::Set(Value::from(this_id.to_string())));
                    update(db, target, id, &updates_fk)?;
                }
                RelDirective::Create(fields) => {
                    let mut fields = fields.clone();
                    fields.insert(foreign_key.clone(), Value::from(this_id.to_string()));
                    create(db, target, fields)?;
                }
                RelDirective::Disconnect => {
                    let target_snapshot = db.snapshot(target)?;
                    let mut clear_fk = UpdateSet::new();
                    clear_fk.insert(foreign_key.clone(), FieldUpdate::Set(Value::Null));
                    for (tid, trecord) in target_snapshot.entities.iter() {
                        if trecord.get(foreign_key).map(|v| v.to_display_string()) == Some(this_id.to_string()) {
                            update(db, target, tid, &clear_fk)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// `createWithRelationships`.
pub fn create_with_relationships(
    db: &Database,
    collection: &str,
    mut input: Record,
    directives: &RelDirectives,
) -> Result<Record> {
    for (name, directive) in directives {
        apply_rel_directive(db, collection, &mut input, None, name, directive)?;
    }
    let created = create(db, collection, input)?;
    let id = created.get("id").unwrap().to_display_string();
    for (name, directive) in directives {
        let relationships = db.relationships_of(collection).unwrap();
        if matches!(relationships.get(name).map(|r| &r.kind), Some(RelationshipKind::Inverse { .. })) {
            apply_rel_directive(db, collection, &mut Record::new(), Some(&id), name, directive)?;
        }
    }
    Ok(created)
}

/// `updateWithRelationships`.
pub fn update_with_relationships(
    db: &Database,
    collection: &str,
    id: &str,
    updates: &UpdateSet,
    directives: &RelDirectives,
) -> Result<Record> {
    let mut fk_input = Record::new();
    for (name, directive) in directives {
        apply_rel_directive(db, collection, &mut fk_input, Some(id), name, directive)?;
    }
    let mut merged = updates.clone();
    for (field, value) in fk_input {
        merged.insert(field, FieldUpdate::Set(value));
    }
    update(db, collection, id, &merged)
}

/// `deleteWithRelationships` — same as `delete`; relationship directives are
/// not meaningful on a delete path beyond the standard cascade rules.
pub fn delete_with_relationships(db: &Database, collection: &str, id: &str, soft: bool) -> Result<DeleteResult> {
    delete_one(db, collection, id, soft)
}
