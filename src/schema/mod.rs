//! Collection schema definitions and structural validation (C9).
//!
//! A [`CollectionSchema`] is a runtime description of a record's shape:
//! field names, primitive types, optionality, literal enums, and nested
//! lists/mappings. [`CollectionSchema::validate`] compiles down to a single
//! pass over a candidate [`Record`] that either returns a validated record
//! (with type coercion and declared defaults applied) or a list of
//! [`SchemaIssue`]s.

use crate::error::{SchemaIssue, ValidationError};
use crate::value::{Record, Value};

/// The declared type of a schema field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    /// `null`.
    Null,
    /// Boolean.
    Bool,
    /// Finite number.
    Number,
    /// UTF-8 string.
    String,
    /// A literal enum of allowed string values.
    Enum(Vec<String>),
    /// An ordered list whose elements must match the inner type.
    List(Box<FieldType>),
    /// A nested string-keyed mapping; not further validated field-by-field.
    Map,
    /// Accepts any value.
    Any,
}

impl FieldType {
    fn describe(&self) -> String {
        match self {
            FieldType::Null => "null".to_string(),
            FieldType::Bool => "bool".to_string(),
            FieldType::Number => "number".to_string(),
            FieldType::String => "string".to_string(),
            FieldType::Enum(values) => format!("one of {:?}", values),
            FieldType::List(inner) => format!("list of {}", inner.describe()),
            FieldType::Map => "map".to_string(),
            FieldType::Any => "any".to_string(),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::Any, _) => true,
            (FieldType::Null, Value::Null) => true,
            (FieldType::Bool, Value::Bool(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Enum(allowed), Value::String(s)) => allowed.iter().any(|a| a == s),
            (FieldType::List(inner), Value::List(items)) => {
                items.iter().all(|item| inner.matches(item))
            }
            (FieldType::Map, Value::Map(_)) => true,
            _ => false,
        }
    }
}

/// A single field declaration in a [`CollectionSchema`].
#[derive(Clone, Debug)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Declared type.
    pub ty: FieldType,
    /// Whether the field may be absent or null.
    pub optional: bool,
    /// Value substituted when the field is absent and not optional-without-default.
    pub default: Option<Value>,
}

impl FieldSchema {
    /// Creates a required field of the given type.
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default: None,
        }
    }

    /// Creates an optional field of the given type.
    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: true,
            default: None,
        }
    }

    /// Attaches a default value, applied when the field is missing.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// The structural contract for a collection's entities.
///
/// Every entity implicitly carries a mandatory `id: string` field in
/// addition to the declared fields (spec.md §3); `validate` enforces this
/// even if the caller's `fields` list does not repeat it.
#[derive(Clone, Debug, Default)]
pub struct CollectionSchema {
    /// Declared fields, in declaration order.
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    /// Creates a new empty schema (no fields beyond the mandatory `id`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field declaration, returning `self` for chaining.
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns true if this schema declares a `deletedAt` field (soft-delete support).
    pub fn supports_soft_delete(&self) -> bool {
        self.fields.iter().any(|f| f.name == "deletedAt")
    }

    /// Validates a candidate record against this schema.
    ///
    /// On success, returns a new record with declared defaults applied for
    /// missing optional fields. On failure, returns every issue found (not
    /// just the first), so callers can report everything wrong with the
    /// input in one pass.
    pub fn validate(&self, record: &Record) -> Result<Record, ValidationError> {
        let mut issues = Vec::new();
        let mut out = record.clone();

        if !record.contains_key("id") {
            issues.push(SchemaIssue::new("id", "required field missing"));
        } else if !matches!(record.get("id"), Some(Value::String(s)) if !s.is_empty()) {
            issues.push(SchemaIssue::new("id", "must be a non-empty string"));
        }

        for field in &self.fields {
            match record.get(&field.name) {
                Some(value) => {
                    if !(field.optional && value.is_null()) && !field.ty.matches(value) {
                        issues.push(SchemaIssue::new(
                            &field.name,
                            format!("expected {}, got {}", field.ty.describe(), describe_value(value)),
                        ));
                    }
                }
                None => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.clone(), default.clone());
                    } else if !field.optional {
                        issues.push(SchemaIssue::new(&field.name, "required field missing"));
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(out)
        } else {
            Err(ValidationError::Schema { issues })
        }
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::List(_) => "list",
        Value::Map(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> CollectionSchema {
        CollectionSchema::new()
            .field(FieldSchema::required("title", FieldType::String))
            .field(FieldSchema::optional("year", FieldType::Number))
            .field(FieldSchema::required("status", FieldType::Enum(vec![
                "draft".to_string(),
                "published".to_string(),
            ])))
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_valid_record_passes() {
        let schema = sample_schema();
        let rec = record(&[
            ("id", Value::from("1")),
            ("title", Value::from("Dune")),
            ("status", Value::from("published")),
        ]);
        assert!(schema.validate(&rec).is_ok());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let schema = sample_schema();
        let rec = record(&[("id", Value::from("1")), ("status", Value::from("draft"))]);
        let err = schema.validate(&rec).unwrap_err();
        match err {
            ValidationError::Schema { issues } => {
                assert!(issues.iter().any(|i| i.field == "title"));
            }
            _ => panic!("expected schema error"),
        }
    }

    #[test]
    fn test_enum_rejects_unknown_value() {
        let schema = sample_schema();
        let rec = record(&[
            ("id", Value::from("1")),
            ("title", Value::from("Dune")),
            ("status", Value::from("archived")),
        ]);
        assert!(schema.validate(&rec).is_err());
    }

    #[test]
    fn test_missing_id_fails() {
        let schema = CollectionSchema::new();
        let rec = record(&[("title", Value::from("x"))]);
        assert!(schema.validate(&rec).is_err());
    }

    #[test]
    fn test_default_applied_for_missing_optional() {
        let schema = CollectionSchema::new()
            .field(FieldSchema::optional("archived", FieldType::Bool).with_default(Value::from(false)));
        let rec = record(&[("id", Value::from("1"))]);
        let validated = schema.validate(&rec).unwrap();
        assert_eq!(validated.get("archived"), Some(&Value::from(false)));
    }

    #[test]
    fn test_multiple_issues_all_reported() {
        let schema = sample_schema();
        let rec = record(&[("id", Value::from("1"))]);
        let err = schema.validate(&rec).unwrap_err();
        match err {
            ValidationError::Schema { issues } => assert!(issues.len() >= 2),
            _ => panic!("expected schema error"),
        }
    }

    #[test]
    fn test_supports_soft_delete() {
        let with = CollectionSchema::new().field(FieldSchema::optional("deletedAt", FieldType::String));
        let without = CollectionSchema::new();
        assert!(with.supports_soft_delete());
        assert!(!without.supports_soft_delete());
    }
}
