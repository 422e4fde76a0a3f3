//! Aggregation engine (C8): count/sum/avg/min/max, grouped or ungrouped.

use indexmap::IndexMap;

use crate::error::Result;
use crate::query::Expr;
use crate::store::{encode_tuple_key, is_soft_deleted, tuple_values, EntityMapState};
use crate::value::{Record, Value};

/// Which metrics to compute, and over which fields.
#[derive(Clone, Debug, Default)]
pub struct AggregateMetrics {
    pub count: bool,
    pub sum: Vec<String>,
    pub avg: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
}

/// Full aggregation request.
#[derive(Clone, Debug, Default)]
pub struct AggregateConfig {
    pub where_: Option<Expr>,
    pub metrics: AggregateMetrics,
    pub group_by: Vec<String>,
}

/// One row of computed metrics (ungrouped, or one group's row).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateRow {
    /// Group key values, in `group_by` field order; empty when ungrouped.
    pub key: Vec<Value>,
    pub count: Option<u64>,
    pub sum: IndexMap<String, f64>,
    pub avg: IndexMap<String, Option<f64>>,
    pub min: IndexMap<String, Option<f64>>,
    pub max: IndexMap<String, Option<f64>>,
}

fn numeric_values<'a>(records: &'a [&'a Record], field: &str) -> Vec<f64> {
    records.iter().filter_map(|r| r.get(field).and_then(Value::as_f64)).collect()
}

fn compute_row(records: &[&Record], key: Vec<Value>, metrics: &AggregateMetrics) -> AggregateRow {
    let mut row = AggregateRow {
        key,
        ..Default::default()
    };
    if metrics.count {
        row.count = Some(records.len() as u64);
    }
    for field in &metrics.sum {
        let values = numeric_values(records, field);
        row.sum.insert(field.clone(), values.iter().sum());
    }
    for field in &metrics.avg {
        let values = numeric_values(records, field);
        let avg = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };
        row.avg.insert(field.clone(), avg);
    }
    for field in &metrics.min {
        let values = numeric_values(records, field);
        row.min.insert(field.clone(), values.iter().cloned().fold(None, |acc, v| {
            Some(acc.map_or(v, |a: f64| a.min(v)))
        }));
    }
    for field in &metrics.max {
        let values = numeric_values(records, field);
        row.max.insert(field.clone(), values.iter().cloned().fold(None, |acc, v| {
            Some(acc.map_or(v, |a: f64| a.max(v)))
        }));
    }
    row
}

/// Runs an aggregation over `state`'s live entities.
///
/// Returns a single-element vector with an empty `key` when `group_by` is
/// empty; otherwise one row per distinct group key, ordered by natural
/// tuple comparison (spec.md §4.8, §9).
pub fn run_aggregate(state: &EntityMapState, config: &AggregateConfig, default_search_fields: &[String]) -> Result<Vec<AggregateRow>> {
    let mut matched: Vec<&Record> = Vec::new();
    for record in state.entities.values() {
        if is_soft_deleted(record) {
            continue;
        }
        let keep = match &config.where_ {
            Some(expr) => expr.evaluate(record, default_search_fields)?,
            None => true,
        };
        if keep {
            matched.push(record);
        }
    }

    if config.group_by.is_empty() {
        return Ok(vec![compute_row(&matched, Vec::new(), &config.metrics)]);
    }

    let mut groups: IndexMap<String, (Vec<Value>, Vec<&Record>)> = IndexMap::new();
    for record in matched {
        let tuple = tuple_values(record, &config.group_by);
        let key = encode_tuple_key(&tuple);
        let owned_tuple: Vec<Value> = tuple.into_iter().cloned().collect();
        groups.entry(key).or_insert_with(|| (owned_tuple, Vec::new())).1.push(record);
    }

    let mut rows: Vec<AggregateRow> = groups
        .into_values()
        .map(|(key, records)| compute_row(&records, key, &config.metrics))
        .collect();

    rows.sort_by(|a, b| {
        for (x, y) in a.key.iter().zip(b.key.iter()) {
            let cmp = x.natural_cmp(y);
            if cmp != std::cmp::Ordering::Equal {
                return cmp;
            }
        }
        std::cmp::Ordering::Equal
    });

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn state_with(pairs: Vec<(&str, &str, f64)>) -> EntityMapState {
        let mut entities = IndexMap::new();
        for (id, status, price) in pairs {
            let mut r = Record::new();
            r.insert("id".to_string(), Value::from(id));
            r.insert("status".to_string(), Value::from(status));
            r.insert("price".to_string(), Value::from(price));
            entities.insert(id.to_string(), r);
        }
        EntityMapState { entities, indexes: HashMap::new(), unique: HashMap::new() }
    }

    #[test]
    fn test_ungrouped_count_and_sum() {
        let state = state_with(vec![("1", "live", 10.0), ("2", "live", 20.0)]);
        let config = AggregateConfig {
            where_: None,
            metrics: AggregateMetrics { count: true, sum: vec!["price".to_string()], ..Default::default() },
            group_by: Vec::new(),
        };
        let rows = run_aggregate(&state, &config, &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, Some(2));
        assert_eq!(rows[0].sum.get("price"), Some(&30.0));
    }

    #[test]
    fn test_grouped_by_status_sorted() {
        let state = state_with(vec![("1", "b", 1.0), ("2", "a", 2.0), ("3", "a", 3.0)]);
        let config = AggregateConfig {
            where_: None,
            metrics: AggregateMetrics { count: true, ..Default::default() },
            group_by: vec!["status".to_string()],
        };
        let rows = run_aggregate(&state, &config, &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, vec![Value::from("a")]);
        assert_eq!(rows[0].count, Some(2));
        assert_eq!(rows[1].key, vec![Value::from("b")]);
    }

    #[test]
    fn test_empty_group_metrics() {
        let state = state_with(vec![]);
        let config = AggregateConfig {
            where_: None,
            metrics: AggregateMetrics {
                count: true,
                sum: vec!["price".to_string()],
                avg: vec!["price".to_string()],
                min: vec!["price".to_string()],
                max: vec!["price".to_string()],
            },
            group_by: Vec::new(),
        };
        let rows = run_aggregate(&state, &config, &[]).unwrap();
        assert_eq!(rows[0].count, Some(0));
        assert_eq!(rows[0].sum.get("price"), Some(&0.0));
        assert_eq!(rows[0].avg.get("price"), Some(&None));
        assert_eq!(rows[0].min.get("price"), Some(&None));
    }
}
