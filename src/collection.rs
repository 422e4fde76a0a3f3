//! Per-collection handle (C6/C7 entry point): the object application code
//! actually calls `query`/`create`/`update`/... on.

use crate::aggregate::{self, AggregateConfig, AggregateRow};
use crate::crud::{
    self, CreateManyOptions, CreateManyResult, DeleteResult, RelDirectives, UpdateSet, UpsertResult,
};
use crate::db::Database;
use crate::error::{NotFoundError, Result};
use crate::query::{self, QueryOptions, QueryResult};
use crate::store::is_soft_deleted;
use crate::value::Record;

/// A thin, borrowed facade over one collection of a [`Database`]. Obtain
/// one with [`Database::collection`] (re-exported at the crate root as
/// `Database::collection`); every method here delegates to a free function
/// in `crud`, `query`, or `aggregate`.
#[derive(Clone, Copy)]
pub struct CollectionHandle<'a> {
    db: &'a Database,
    name: &'a str,
}

impl<'a> CollectionHandle<'a> {
    /// Creates a handle over `name` within `db`. Does not check that `name`
    /// was declared; that happens lazily on first access, matching every
    /// other accessor on [`Database`].
    pub fn new(db: &'a Database, name: &'a str) -> Self {
        Self { db, name }
    }

    /// The collection name this handle addresses.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Runs the full query pipeline (filter → populate → sort →
    /// paginate/cursor → project) over this collection's current snapshot.
    pub fn query(&self, options: &QueryOptions) -> Result<QueryResult> {
        let snapshot = self.db.snapshot(self.name)?;
        let search_fields = self.db.default_search_fields(self.name);
        query::run_query(self.name, &snapshot, options, &search_fields, self.db, false)
    }

    /// Looks up a single entity by id, excluding soft-deleted entities.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Record>> {
        let snapshot = self.db.snapshot(self.name)?;
        Ok(snapshot.get(id).filter(|r| !is_soft_deleted(r)).cloned())
    }

    /// Looks up a single entity by id, failing with `NotFoundError` if absent.
    pub fn get(&self, id: &str) -> Result<Record> {
        self.find_by_id(id)?.ok_or_else(|| NotFoundError::new(self.name, id).into())
    }

    /// `create(input)`.
    pub fn create(&self, input: Record) -> Result<Record> {
        crud::create(self.db, self.name, input)
    }

    /// `createMany(inputs, options)`.
    pub fn create_many(&self, inputs: Vec<Record>, options: &CreateManyOptions) -> Result<CreateManyResult> {
        crud::create_many(self.db, self.name, inputs, options)
    }

    /// `update(id, updates)`.
    pub fn update(&self, id: &str, updates: &UpdateSet) -> Result<Record> {
        crud::update(self.db, self.name, id, updates)
    }

    /// `updateMany(predicate, updates)`.
    pub fn update_many(&self, predicate: &query::Expr, updates: &UpdateSet) -> Result<Vec<Record>> {
        crud::update_many(self.db, self.name, predicate, updates)
    }

    /// `delete(id, options)`.
    pub fn delete(&self, id: &str, soft: bool) -> Result<DeleteResult> {
        crud::delete(self.db, self.name, id, soft)
    }

    /// `deleteMany(predicate, options)`.
    pub fn delete_many(&self, predicate: &query::Expr, soft: bool, limit: Option<usize>) -> Result<DeleteResult> {
        crud::delete_many(self.db, self.name, predicate, soft, limit)
    }

    /// `upsert(input)`.
    pub fn upsert(&self, input: Record) -> Result<UpsertResult> {
        crud::upsert(self.db, self.name, input)
    }

    /// `upsertMany(inputs)`.
    pub fn upsert_many(&self, inputs: Vec<Record>) -> Result<Vec<UpsertResult>> {
        crud::upsert_many(self.db, self.name, inputs)
    }

    /// `createWithRelationships(input, directives)`.
    pub fn create_with_relationships(&self, input: Record, directives: &RelDirectives) -> Result<Record> {
        crud::create_with_relationships(self.db, self.name, input, directives)
    }

    /// `updateWithRelationships(id, updates, directives)`.
    pub fn update_with_relationships(
        &self,
        id: &str,
        updates: &UpdateSet,
        directives: &RelDirectives,
    ) -> Result<Record> {
        crud::update_with_relationships(self.db, self.name, id, updates, directives)
    }

    /// `deleteWithRelationships(id, options)` — relationship directives do
    /// not apply to a single delete beyond the standard cascade rules.
    pub fn delete_with_relationships(&self, id: &str, soft: bool) -> Result<DeleteResult> {
        crud::delete_with_relationships(self.db, self.name, id, soft)
    }

    /// `deleteManyWithRelationships(predicate, options)`.
    pub fn delete_many_with_relationships(
        &self,
        predicate: &query::Expr,
        soft: bool,
        limit: Option<usize>,
    ) -> Result<DeleteResult> {
        crud::delete_many(self.db, self.name, predicate, soft, limit)
    }

    /// `aggregate(config)` (spec.md §4.8).
    pub fn aggregate(&self, config: &AggregateConfig) -> Result<Vec<AggregateRow>> {
        let snapshot = self.db.snapshot(self.name)?;
        let search_fields = self.db.default_search_fields(self.name);
        aggregate::run_aggregate(&snapshot, config, &search_fields)
    }
}

impl Database {
    /// Returns a handle over `name` for running queries and mutations.
    pub fn collection<'a>(&'a self, name: &'a str) -> CollectionHandle<'a> {
        CollectionHandle::new(self, name)
    }
}
