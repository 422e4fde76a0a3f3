//! Property-based coverage of the quantified invariants in spec.md §8.

use proptest::prelude::*;

use proseql::{CollectionConfig, CollectionSchema, Database, DatabaseConfig, FieldSchema, FieldType};
use proseql::{CmpOp, Expr, QueryOptions, QueryResult, Record, SortDirection, Value};

fn ranked_config() -> DatabaseConfig {
    let schema = CollectionSchema::new()
        .field(FieldSchema::required("rank", FieldType::Number))
        .field(FieldSchema::required("tag", FieldType::String));
    DatabaseConfig::new().collection("items", CollectionConfig::new(schema))
}

fn rec(id: &str, rank: f64, tag: &str) -> Record {
    let mut r = Record::new();
    r.insert("id".to_string(), Value::from(id));
    r.insert("rank".to_string(), Value::from(rank));
    r.insert("tag".to_string(), Value::from(tag));
    r
}

fn seeded_db(ranks: &[(f64, &str)]) -> Database {
    let db = Database::open_in_memory(ranked_config()).unwrap();
    let items = db.collection("items");
    for (i, (rank, tag)) in ranks.iter().enumerate() {
        items.create(rec(&format!("i{i}"), *rank, tag)).unwrap();
    }
    db
}

proptest! {
    /// Invariant 2: `query({ where })` equals the set of entities satisfying `where`.
    #[test]
    fn where_clause_matches_predicate_exactly(ranks in prop::collection::vec(-100.0f64..100.0, 1..40), threshold in -100.0f64..100.0) {
        let tagged: Vec<(f64, &str)> = ranks.iter().map(|r| (*r, "x")).collect();
        let db = seeded_db(&tagged);
        let mut options = QueryOptions::new();
        options.where_ = Some(Expr::Cmp { field: "rank".into(), op: CmpOp::Gte, value: Value::from(threshold) });
        let QueryResult::Page(items) = db.collection("items").query(&options).unwrap() else {
            panic!("expected page");
        };

        let expected: usize = ranks.iter().filter(|r| **r >= threshold).count();
        prop_assert_eq!(items.len(), expected);
        for item in &items {
            let rank = item.get("rank").unwrap().as_f64().unwrap();
            prop_assert!(rank >= threshold);
        }
    }

    /// Invariant 3 (monotonicity half): every adjacent pair in a sorted
    /// ascending-rank query satisfies the sort direction.
    #[test]
    fn ascending_sort_is_monotonic(ranks in prop::collection::vec(-1000.0f64..1000.0, 0..50)) {
        let tagged: Vec<(f64, &str)> = ranks.iter().map(|r| (*r, "x")).collect();
        let db = seeded_db(&tagged);
        let mut options = QueryOptions::new();
        options.sort.insert("rank".to_string(), SortDirection::Asc);
        let QueryResult::Page(items) = db.collection("items").query(&options).unwrap() else {
            panic!("expected page");
        };
        for pair in items.windows(2) {
            let a = pair[0].get("rank").unwrap().as_f64().unwrap();
            let b = pair[1].get("rank").unwrap().as_f64().unwrap();
            prop_assert!(a <= b);
        }
    }

    /// Invariant 4: offset/limit composition equals drop(O, take(O+L, unpaginated)).
    #[test]
    fn pagination_composition_matches_drop_take(
        ranks in prop::collection::vec(-50.0f64..50.0, 0..30),
        offset in 0usize..20,
        limit in 0usize..20,
    ) {
        let tagged: Vec<(f64, &str)> = ranks.iter().map(|r| (*r, "x")).collect();
        let db = seeded_db(&tagged);

        let mut unpaginated = QueryOptions::new();
        unpaginated.sort.insert("rank".to_string(), SortDirection::Asc);
        let QueryResult::Page(full) = db.collection("items").query(&unpaginated).unwrap() else {
            panic!("expected page");
        };
        let expected: Vec<&Record> = full.iter().skip(offset).take(limit).collect();

        let mut paged = QueryOptions::new();
        paged.sort.insert("rank".to_string(), SortDirection::Asc);
        paged.offset = Some(offset as i64);
        paged.limit = Some(limit as i64);
        let QueryResult::Page(actual) = db.collection("items").query(&paged).unwrap() else {
            panic!("expected page");
        };

        prop_assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            prop_assert_eq!(a.get("id"), e.get("id"));
        }
    }
}

/// Invariant 1: `findById` returns exactly the latest written entity, or
/// `NotFoundError` for an id never created.
#[test]
fn find_by_id_reflects_the_latest_write() {
    let db = Database::open_in_memory(ranked_config()).unwrap();
    let items = db.collection("items");
    items.create(rec("i1", 1.0, "a")).unwrap();
    items.update("i1", &{
        let mut updates = proseql::UpdateSet::new();
        updates.insert("tag".to_string(), proseql::FieldUpdate::Set(Value::from("b")));
        updates
    }).unwrap();

    let found = items.get("i1").unwrap();
    assert_eq!(found.get("tag"), Some(&Value::from("b")));
    assert!(items.get("missing").is_err());
}

/// Invariant 6: aggregation count agrees with the equivalent query's length.
#[test]
fn aggregate_count_matches_query_length() {
    let db = seeded_db(&[(1.0, "a"), (2.0, "b"), (3.0, "a")]);
    let mut query_options = QueryOptions::new();
    query_options.where_ = Some(Expr::Cmp { field: "tag".into(), op: CmpOp::Eq, value: Value::from("a") });
    let QueryResult::Page(items) = db.collection("items").query(&query_options).unwrap() else {
        panic!("expected page");
    };

    let mut agg_config = proseql::AggregateConfig::default();
    agg_config.where_ = query_options.where_.clone();
    agg_config.metrics.count = true;
    let rows = db.collection("items").aggregate(&agg_config).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, Some(items.len() as u64));
}
