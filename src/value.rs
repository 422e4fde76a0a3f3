//! The dynamic document value tree entities and collection files are built from.
//!
//! Collection schemas are data, not Rust types — an application declares a
//! [`crate::schema::CollectionSchema`] at runtime, so entity values are
//! represented as a typed document tree rather than a generic struct. Every
//! codec (`src/codec/*`) converts its text format to and from this tree;
//! the query pipeline, schema validator, and aggregation engine all operate
//! on it directly.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A record is a single entity's fields, keyed by field name.
///
/// `IndexMap` preserves declaration order so a round-tripped entity keeps
/// the field order it was written with.
pub type Record = IndexMap<String, Value>;

/// A dynamic document value: null, boolean, finite number, string, ordered
/// list, or string-keyed mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent/null value.
    Null,
    /// Boolean.
    Bool(bool),
    /// A finite 64-bit float. NaN/infinite values are rejected at the
    /// boundary (codecs and the schema validator both guard against them).
    Number(f64),
    /// UTF-8 text.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Ordered string-keyed mapping.
    Map(Record),
}

impl Value {
    /// Returns true if this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as a `&str`, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as an `f64`, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a `bool`, if it is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the value as a record, if it is a map.
    pub fn as_map(&self) -> Option<&Record> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable counterpart to [`Value::as_map`], used by codecs that patch
    /// fields in place (e.g. the prose codec's multi-line field assembly).
    pub fn as_map_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a field on this value if it is a map, else `None`.
    ///
    /// Missing fields and non-map values both resolve to `None`, matching
    /// the filter stage's "unknown fields are treated as null" rule once
    /// combined with [`Value::field_or_null`].
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(field))
    }

    /// Looks up a field, returning `&Value::Null` (a static) when absent.
    pub fn field_or_null<'a>(&'a self, field: &str) -> &'a Value {
        self.get(field).unwrap_or(&Value::Null)
    }

    /// A coarse type tag, used for cross-type comparisons.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::List(_) => 4,
            Value::Map(_) => 5,
        }
    }

    /// Renders the value as a string for cross-type fallback comparisons and
    /// for the prose codec's literal field substitution.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_display_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(_) => "[object]".to_string(),
        }
    }

    /// Natural ordering used by the sort stage and group-key comparison:
    /// null/undefined sort after all non-null values; same-typed values
    /// compare naturally; cross-type falls back to lexicographic string form.
    pub fn natural_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let c = x.natural_cmp(y);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => {
                let rank = self.type_rank().cmp(&other.type_rank());
                if rank != Ordering::Equal {
                    // Both non-null, differing types: fall back to string form
                    // rather than the coarse rank, per the spec's cross-type rule.
                    self.to_display_string().cmp(&other.to_display_string())
                } else {
                    Ordering::Equal
                }
            }
        }
    }

    /// Equality used by `$eq`/`$ne` and by null-comparison rules: null
    /// compares equal only to null.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.loose_eq(bv)))
            }
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.loose_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<crate::types::Timestamp> for Value {
    fn from(t: crate::types::Timestamp) -> Self {
        Value::String(t.to_rfc3339())
    }
}

/// Formats a float the way the codecs want it on the page: integral values
/// print without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sorts_last() {
        assert_eq!(Value::Null.natural_cmp(&Value::Number(1.0)), Ordering::Greater);
        assert_eq!(Value::Number(1.0).natural_cmp(&Value::Null), Ordering::Less);
        assert_eq!(Value::Null.natural_cmp(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn test_loose_eq_null_only_equals_null() {
        assert!(Value::Null.loose_eq(&Value::Null));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
        assert!(!Value::Number(0.0).loose_eq(&Value::Null));
    }

    #[test]
    fn test_natural_cmp_numbers() {
        assert_eq!(Value::Number(1.0).natural_cmp(&Value::Number(2.0)), Ordering::Less);
    }

    #[test]
    fn test_get_missing_field_is_none() {
        let v = Value::Map(Record::new());
        assert!(v.get("missing").is_none());
        assert!(v.field_or_null("missing").is_null());
    }

    #[test]
    fn test_format_number_integral() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.5), "3.5");
    }

    #[test]
    fn test_to_display_string_list() {
        let v = Value::List(vec![Value::from("a"), Value::from(1.0)]);
        assert_eq!(v.to_display_string(), "[a, 1]");
    }
}
