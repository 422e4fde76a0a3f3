//! Query pipeline (C6): filter → populate → sort → paginate/cursor → project.
//!
//! ```text
//! identity map values
//!        │
//!        ▼  (b) filter: Expr tree, unknown fields read as null
//!        ▼  (c) populate: resolve ref/inverse relationships
//!        ▼  (d) sort: stable, natural_cmp, null last
//!        ▼  (e)/(f) paginate: offset/limit OR cursor (mutually exclusive)
//!        ▼  (g) project: select
//!   Vec<Record> | CursorPage
//! ```

pub mod cursor;
pub mod expr;
pub mod populate;
pub mod project;
pub mod sort;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Result, ValidationError};
use crate::relationship::RelationshipConfig;
use crate::store::EntityMapState;
use crate::store::is_soft_deleted;
use crate::value::Record;

pub use cursor::{CursorConfig, PageInfo};
pub use expr::{CmpOp, Expr};
pub use project::{Select, SelectEntry};
pub use sort::{SortDirection, SortKeys};

/// Cross-collection context the query pipeline needs for `populate`:
/// another collection's current snapshot and its relationship declarations.
/// Implemented by [`crate::db::Database`].
pub trait CollectionLookup {
    fn snapshot_of(&self, name: &str) -> Option<Arc<EntityMapState>>;
    fn relationships_of(&self, name: &str) -> Option<&IndexMap<String, RelationshipConfig>>;
}

/// Nested populate options (spec.md §4.6(c)): recursive select/populate,
/// an optional sort for `inverse` relationships, and the `optional` flag
/// that downgrades a dangling `ref` to `null` instead of an error.
#[derive(Clone, Debug, Default)]
pub struct PopulateOptions {
    pub select: Option<Select>,
    pub populate: IndexMap<String, PopulateSpec>,
    pub sort: SortKeys,
    pub optional: bool,
}

/// A populate directive's value: bare `true` (default resolve) or nested options.
#[derive(Clone, Debug)]
pub enum PopulateSpec {
    Default,
    Options(PopulateOptions),
}

/// Full set of options accepted by a collection's `query` method.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub where_: Option<Expr>,
    pub populate: IndexMap<String, PopulateSpec>,
    pub sort: SortKeys,
    pub select: Option<Select>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub cursor: Option<CursorConfig>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(&self) -> Result<()> {
        if self.cursor.is_some() && (self.limit.is_some() || self.offset.is_some()) {
            return Err(ValidationError::invalid_query(
                "cursor pagination is mutually exclusive with offset/limit",
            )
            .into());
        }
        if self.limit.is_some_and(|l| l < 0) || self.offset.is_some_and(|o| o < 0) {
            return Err(ValidationError::invalid_query("limit/offset must not be negative").into());
        }
        if let Some(cursor) = &self.cursor {
            if let Some(existing) = self.sort.keys().next() {
                if existing != &cursor.key {
                    return Err(ValidationError::invalid_query(
                        "explicit sort conflicts with cursor key",
                    )
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// The result of running a query: either a plain page (offset/limit) or a
/// cursor page with its envelope.
#[derive(Debug)]
pub enum QueryResult {
    Page(Vec<Record>),
    Cursor { items: Vec<Record>, page_info: PageInfo },
}

/// Runs the full pipeline over `collection`'s current snapshot.
pub fn run_query(
    collection: &str,
    state: &EntityMapState,
    options: &QueryOptions,
    default_search_fields: &[String],
    lookup: &dyn CollectionLookup,
    include_soft_deleted: bool,
) -> Result<QueryResult> {
    options.validate()?;

    // (a) source + (b) filter
    let mut matched: Vec<(String, Record)> = Vec::new();
    for (id, record) in &state.entities {
        if !include_soft_deleted && is_soft_deleted(record) {
            continue;
        }
        let keep = match &options.where_ {
            Some(expr) => expr.evaluate(record, default_search_fields)?,
            None => true,
        };
        if keep {
            matched.push((id.clone(), record.clone()));
        }
    }

    // (c) populate
    let implied = options
        .select
        .as_ref()
        .map(Select::implied_populate)
        .unwrap_or_default();
    let populate_directives: &IndexMap<String, PopulateSpec> = if !options.populate.is_empty() {
        &options.populate
    } else {
        &implied
    };
    if !populate_directives.is_empty() {
        for (_, record) in matched.iter_mut() {
            populate::populate_record(collection, record, populate_directives, lookup)?;
        }
    }

    // (d) sort
    let mut sort_keys = options.sort.clone();
    if let Some(cursor) = &options.cursor {
        if sort_keys.is_empty() {
            sort_keys.insert(cursor.key.clone(), SortDirection::Asc);
        }
    }
    sort::apply_sort(&mut matched, &sort_keys);

    // (e)/(f) paginate
    if let Some(cursor) = &options.cursor {
        let (page, page_info) = cursor::paginate(&matched, cursor)?;
        let items = page
            .into_iter()
            .map(|(_, record)| project::project(record, options.select.as_ref()))
            .collect();
        return Ok(QueryResult::Cursor { items, page_info });
    }

    let offset = options.offset.unwrap_or(0) as usize;
    let limit = options.limit.map(|l| l as usize);
    let sliced: Vec<&(String, Record)> = matched
        .iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    let projected = sliced
        .into_iter()
        .map(|(_, record)| project::project(record, options.select.as_ref()))
        .collect();
    Ok(QueryResult::Page(projected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::collections::HashMap;

    struct NullLookup;
    impl CollectionLookup for NullLookup {
        fn snapshot_of(&self, _name: &str) -> Option<Arc<EntityMapState>> {
            None
        }
        fn relationships_of(&self, _name: &str) -> Option<&IndexMap<String, RelationshipConfig>> {
            None
        }
    }

    fn state_with(records: Vec<(&str, f64)>) -> EntityMapState {
        let mut entities = IndexMap::new();
        for (id, year) in records {
            let mut r = Record::new();
            r.insert("id".to_string(), Value::from(id));
            r.insert("year".to_string(), Value::from(year));
            entities.insert(id.to_string(), r);
        }
        EntityMapState {
            entities,
            indexes: HashMap::new(),
            unique: HashMap::new(),
        }
    }

    #[test]
    fn test_filter_matches_equality() {
        let state = state_with(vec![("1", 1965.0), ("2", 1984.0)]);
        let mut options = QueryOptions::new();
        options.where_ = Some(Expr::Cmp { field: "year".into(), op: CmpOp::Eq, value: Value::from(1965.0) });
        let QueryResult::Page(items) = run_query("books", &state, &options, &[], &NullLookup, false).unwrap() else {
            panic!("expected page")
        };
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_offset_limit_composition() {
        let state = state_with(vec![("1", 1.0), ("2", 2.0), ("3", 3.0)]);
        let mut options = QueryOptions::new();
        options.sort.insert("year".to_string(), SortDirection::Asc);
        options.offset = Some(1);
        options.limit = Some(1);
        let QueryResult::Page(items) = run_query("books", &state, &options, &[], &NullLookup, false).unwrap() else {
            panic!("expected page")
        };
        assert_eq!(items[0].get("id"), Some(&Value::from("2")));
    }

    #[test]
    fn test_cursor_and_offset_conflict_rejected() {
        let mut options = QueryOptions::new();
        options.offset = Some(1);
        options.cursor = Some(CursorConfig { key: "year".into(), after: None, page_size: 10 });
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_soft_deleted_excluded_by_default() {
        let mut entities = IndexMap::new();
        let mut live = Record::new();
        live.insert("id".to_string(), Value::from("1"));
        let mut deleted = Record::new();
        deleted.insert("id".to_string(), Value::from("2"));
        deleted.insert("deletedAt".to_string(), Value::from("now"));
        entities.insert("1".to_string(), live);
        entities.insert("2".to_string(), deleted);
        let state = EntityMapState { entities, indexes: HashMap::new(), unique: HashMap::new() };
        let options = QueryOptions::new();
        let QueryResult::Page(items) = run_query("x", &state, &options, &[], &NullLookup, false).unwrap() else {
            panic!("expected page")
        };
        assert_eq!(items.len(), 1);
    }
}
