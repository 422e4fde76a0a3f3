//! Projection stage (`select`, spec.md §4.6(g)).

use indexmap::IndexMap;

use crate::value::{Record, Value};

use super::PopulateSpec;

/// A projection request: either a flat list of top-level fields, or an
/// object mapping whose keys are either bare fields (kept verbatim) or
/// relationship names (already resolved by an implicit/explicit populate).
#[derive(Clone, Debug)]
pub enum Select {
    Fields(Vec<String>),
    Object(IndexMap<String, SelectEntry>),
}

/// One entry in an object-form `select`.
#[derive(Clone, Debug)]
pub enum SelectEntry {
    /// Keep the field as-is.
    Keep,
    /// The key names a relationship; its value carries the nested populate
    /// options it should be resolved with before projection.
    Populate(PopulateSpec),
}

impl Select {
    /// Collects the relationship names an object-form select implicitly
    /// wants populated (spec.md §4.6(g): "implicitly introduces a populate
    /// stage for them ... unless an explicit populate exists").
    pub fn implied_populate(&self) -> IndexMap<String, PopulateSpec> {
        let mut out = IndexMap::new();
        if let Select::Object(fields) = self {
            for (name, entry) in fields {
                if let SelectEntry::Populate(spec) = entry {
                    out.insert(name.clone(), spec.clone());
                }
            }
        }
        out
    }
}

/// Projects `record` per `select`. Returns the whole record unchanged when
/// `select` is `None`.
pub fn project(record: &Record, select: Option<&Select>) -> Record {
    let Some(select) = select else {
        return record.clone();
    };
    match select {
        Select::Fields(fields) => fields
            .iter()
            .filter_map(|f| record.get(f).map(|v| (f.clone(), v.clone())))
            .collect(),
        Select::Object(fields) => fields
            .keys()
            .filter_map(|name| record.get(name).map(|v| (name.clone(), v.clone())))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec() -> Record {
        let mut r = Record::new();
        r.insert("id".to_string(), Value::from("1"));
        r.insert("title".to_string(), Value::from("Dune"));
        r.insert("year".to_string(), Value::from(1965.0));
        r
    }

    #[test]
    fn test_fields_select_keeps_listed_only() {
        let select = Select::Fields(vec!["title".to_string()]);
        let projected = project(&rec(), Some(&select));
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("title"), Some(&Value::from("Dune")));
    }

    #[test]
    fn test_no_select_keeps_everything() {
        let projected = project(&rec(), None);
        assert_eq!(projected.len(), 3);
    }

    #[test]
    fn test_implied_populate_from_object_select() {
        let mut fields = IndexMap::new();
        fields.insert("title".to_string(), SelectEntry::Keep);
        fields.insert("company".to_string(), SelectEntry::Populate(PopulateSpec::Default));
        let select = Select::Object(fields);
        let implied = select.implied_populate();
        assert_eq!(implied.len(), 1);
        assert!(implied.contains_key("company"));
    }
}
