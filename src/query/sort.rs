//! Stable multi-key sort stage (spec.md §4.6(d)).

use indexmap::IndexMap;

use crate::value::{Record, Value};

/// Sort direction for one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// An ordered set of `field → direction` applied lexicographically.
pub type SortKeys = IndexMap<String, SortDirection>;

/// Sorts `records` in place by `keys`, using [`Value::natural_cmp`] and a
/// stable sort so records comparing equal across all keys keep their
/// incoming relative order.
pub fn apply_sort(records: &mut [(String, Record)], keys: &SortKeys) {
    if keys.is_empty() {
        return;
    }
    records.sort_by(|(_, a), (_, b)| {
        for (field, direction) in keys {
            let av = a.get(field).unwrap_or(&Value::Null);
            let bv = b.get(field).unwrap_or(&Value::Null);
            // Null sorts last regardless of direction, so only the
            // non-null-vs-non-null comparison gets reversed for `Desc`.
            let cmp = match (av.is_null(), bv.is_null()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) => {
                    let cmp = av.natural_cmp(bv);
                    match direction {
                        SortDirection::Asc => cmp,
                        SortDirection::Desc => cmp.reverse(),
                    }
                }
            };
            if cmp != std::cmp::Ordering::Equal {
                return cmp;
            }
        }
        std::cmp::Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, year: f64) -> (String, Record) {
        let mut r = Record::new();
        r.insert("id".to_string(), Value::from(id));
        r.insert("year".to_string(), Value::from(year));
        (id.to_string(), r)
    }

    #[test]
    fn test_sort_ascending() {
        let mut records = vec![rec("a", 2000.0), rec("b", 1965.0)];
        let mut keys = SortKeys::new();
        keys.insert("year".to_string(), SortDirection::Asc);
        apply_sort(&mut records, &keys);
        assert_eq!(records[0].0, "b");
    }

    #[test]
    fn test_sort_is_stable() {
        let mut records = vec![rec("a", 2000.0), rec("b", 2000.0), rec("c", 2000.0)];
        let mut keys = SortKeys::new();
        keys.insert("year".to_string(), SortDirection::Asc);
        apply_sort(&mut records, &keys);
        assert_eq!(records.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_null_sorts_last_ascending() {
        let mut r1 = Record::new();
        r1.insert("id".to_string(), Value::from("has-year"));
        r1.insert("year".to_string(), Value::from(5.0));
        let mut r2 = Record::new();
        r2.insert("id".to_string(), Value::from("no-year"));
        let mut records = vec![("no-year".to_string(), r2.clone()), ("has-year".to_string(), r1.clone())];
        let mut keys = SortKeys::new();
        keys.insert("year".to_string(), SortDirection::Asc);
        apply_sort(&mut records, &keys);
        assert_eq!(records[0].0, "has-year");
        assert_eq!(records[1].0, "no-year");
    }

    #[test]
    fn test_null_sorts_last_descending() {
        let mut r1 = Record::new();
        r1.insert("id".to_string(), Value::from("has-year"));
        r1.insert("year".to_string(), Value::from(5.0));
        let mut r2 = Record::new();
        r2.insert("id".to_string(), Value::from("no-year"));
        let mut records = vec![("no-year".to_string(), r2.clone()), ("has-year".to_string(), r1.clone())];
        let mut keys = SortKeys::new();
        keys.insert("year".to_string(), SortDirection::Desc);
        apply_sort(&mut records, &keys);
        assert_eq!(records[0].0, "has-year");
        assert_eq!(records[1].0, "no-year");
    }

    #[test]
    fn test_descending_order_among_non_null_values() {
        let mut records = vec![rec("a", 1965.0), rec("b", 2000.0)];
        let mut keys = SortKeys::new();
        keys.insert("year".to_string(), SortDirection::Desc);
        apply_sort(&mut records, &keys);
        assert_eq!(records[0].0, "b");
        assert_eq!(records[1].0, "a");
    }
}
