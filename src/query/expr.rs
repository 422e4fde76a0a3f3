//! The filter expression tree and its evaluator (spec.md §4.6(b), §9).
//!
//! The operator set is closed and modeled as a tagged variant, per the
//! design note in spec.md §9: `Expr = Cmp(field, op, literal) | And | Or |
//! Not | Search`, evaluated by a pattern match rather than dynamic dispatch.

use regex::Regex;

use crate::error::{Result, ValidationError};
use crate::value::{Record, Value};

/// A comparison operator applied to one field against a literal.
#[derive(Clone, Debug, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

/// The filter expression tree.
#[derive(Clone, Debug)]
pub enum Expr {
    /// A single field comparison.
    Cmp {
        field: String,
        op: CmpOp,
        value: Value,
    },
    /// Every sub-expression must hold.
    And(Vec<Expr>),
    /// At least one sub-expression must hold.
    Or(Vec<Expr>),
    /// The sub-expression must not hold.
    Not(Box<Expr>),
    /// Tokenized full-text match over declared (or explicit) search fields.
    Search {
        query: String,
        fields: Option<Vec<String>>,
    },
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "that", "the", "to", "was", "were", "will", "with",
];

/// Lowercases, splits on non-word characters, and drops stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

fn ordering_satisfies(op: &CmpOp, actual: &Value, literal: &Value) -> bool {
    if actual.is_null() || literal.is_null() {
        return false;
    }
    use std::cmp::Ordering::*;
    let cmp = actual.natural_cmp(literal);
    match op {
        CmpOp::Gt => cmp == Greater,
        CmpOp::Gte => cmp == Greater || cmp == Equal,
        CmpOp::Lt => cmp == Less,
        CmpOp::Lte => cmp == Less || cmp == Equal,
        _ => unreachable!(),
    }
}

fn contains_matches(actual: &Value, literal: &Value) -> bool {
    match actual {
        Value::String(s) => literal.as_str().is_some_and(|needle| s.contains(needle)),
        Value::List(items) => items.iter().any(|item| item.loose_eq(literal)),
        _ => false,
    }
}

fn evaluate_cmp(field: &str, op: &CmpOp, literal: &Value, record: &Record) -> Result<bool> {
    let actual = record.get(field).unwrap_or(&Value::Null);
    Ok(match op {
        CmpOp::Eq => actual.loose_eq(literal),
        CmpOp::Ne => !actual.loose_eq(literal),
        CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte => ordering_satisfies(op, actual, literal),
        CmpOp::In => literal.as_list().is_some_and(|items| items.iter().any(|i| i.loose_eq(actual))),
        CmpOp::Nin => !literal.as_list().is_some_and(|items| items.iter().any(|i| i.loose_eq(actual))),
        CmpOp::Contains => contains_matches(actual, literal),
        CmpOp::StartsWith => actual
            .as_str()
            .zip(literal.as_str())
            .is_some_and(|(s, prefix)| s.starts_with(prefix)),
        CmpOp::EndsWith => actual
            .as_str()
            .zip(literal.as_str())
            .is_some_and(|(s, suffix)| s.ends_with(suffix)),
        CmpOp::Regex => {
            let (Some(s), Some(pattern)) = (actual.as_str(), literal.as_str()) else {
                return Ok(false);
            };
            let re = Regex::new(pattern)
                .map_err(|e| ValidationError::invalid_query(format!("bad $regex pattern: {e}")))?;
            re.is_match(s)
        }
    })
}

fn search_matches(query: &str, fields: Option<&[String]>, default_fields: &[String], record: &Record) -> bool {
    let target_fields: &[String] = fields.unwrap_or(default_fields);
    if target_fields.is_empty() {
        return false;
    }
    let needle_tokens = tokenize(query);
    if needle_tokens.is_empty() {
        return true;
    }
    let mut haystack = String::new();
    for field in target_fields {
        if let Some(Value::String(s)) = record.get(field) {
            haystack.push(' ');
            haystack.push_str(s);
        }
    }
    let haystack_tokens: std::collections::HashSet<String> = tokenize(&haystack).into_iter().collect();
    needle_tokens.iter().all(|t| haystack_tokens.contains(t))
}

impl Expr {
    /// Evaluates this expression against `record`. `default_search_fields`
    /// supplies the collection's declared `$search` fields when a `Search`
    /// node omits its own `fields`.
    pub fn evaluate(&self, record: &Record, default_search_fields: &[String]) -> Result<bool> {
        Ok(match self {
            Expr::Cmp { field, op, value } => evaluate_cmp(field, op, value, record)?,
            Expr::And(parts) => {
                for part in parts {
                    if !part.evaluate(record, default_search_fields)? {
                        return Ok(false);
                    }
                }
                true
            }
            Expr::Or(parts) => {
                for part in parts {
                    if part.evaluate(record, default_search_fields)? {
                        return Ok(true);
                    }
                }
                parts.is_empty()
            }
            Expr::Not(inner) => !inner.evaluate(record, default_search_fields)?,
            Expr::Search { query, fields } => {
                search_matches(query, fields.as_deref(), default_search_fields, record)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_eq_matches() {
        let r = rec(&[("year", Value::from(2000.0))]);
        let e = Expr::Cmp { field: "year".into(), op: CmpOp::Eq, value: Value::from(2000.0) };
        assert!(e.evaluate(&r, &[]).unwrap());
    }

    #[test]
    fn test_null_never_satisfies_ordering() {
        let r = rec(&[]);
        let e = Expr::Cmp { field: "year".into(), op: CmpOp::Gt, value: Value::from(1.0) };
        assert!(!e.evaluate(&r, &[]).unwrap());
    }

    #[test]
    fn test_and_or_not() {
        let r = rec(&[("a", Value::from(1.0)), ("b", Value::from(2.0))]);
        let expr = Expr::And(vec![
            Expr::Cmp { field: "a".into(), op: CmpOp::Eq, value: Value::from(1.0) },
            Expr::Not(Box::new(Expr::Cmp { field: "b".into(), op: CmpOp::Eq, value: Value::from(3.0) })),
        ]);
        assert!(expr.evaluate(&r, &[]).unwrap());
    }

    #[test]
    fn test_contains_list_membership() {
        let r = rec(&[("tags", Value::List(vec![Value::from("rust"), Value::from("db")]))]);
        let e = Expr::Cmp { field: "tags".into(), op: CmpOp::Contains, value: Value::from("rust") };
        assert!(e.evaluate(&r, &[]).unwrap());
    }

    #[test]
    fn test_search_tokenizes_and_filters_stopwords() {
        let r = rec(&[("title", Value::from("The Great Escape"))]);
        let e = Expr::Search { query: "great escape".into(), fields: None };
        assert!(e.evaluate(&r, &["title".to_string()]).unwrap());
    }

    #[test]
    fn test_in_nin() {
        let r = rec(&[("status", Value::from("draft"))]);
        let list = Value::List(vec![Value::from("draft"), Value::from("live")]);
        let e_in = Expr::Cmp { field: "status".into(), op: CmpOp::In, value: list.clone() };
        let e_nin = Expr::Cmp { field: "status".into(), op: CmpOp::Nin, value: list };
        assert!(e_in.evaluate(&r, &[]).unwrap());
        assert!(!e_nin.evaluate(&r, &[]).unwrap());
    }
}
