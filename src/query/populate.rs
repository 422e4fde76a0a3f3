//! Relationship resolution (`populate` stage, spec.md §4.6(c)).

use indexmap::IndexMap;

use crate::error::{DanglingReferenceError, ProseQLError, Result};
use crate::relationship::RelationshipKind;
use crate::value::{Record, Value};

use super::{CollectionLookup, PopulateOptions, PopulateSpec};
use super::project;

/// Resolves every populate directive in `populate` against `record`,
/// mutating the record in place by inserting a field named after the
/// relationship holding the resolved entity (`ref`) or entity list
/// (`inverse`).
pub fn populate_record(
    collection: &str,
    record: &mut Record,
    populate: &IndexMap<String, PopulateSpec>,
    lookup: &dyn CollectionLookup,
) -> Result<()> {
    for (name, spec) in populate {
        let relationships = lookup
            .relationships_of(collection)
            .ok_or_else(|| ProseQLError::operation(format!("{collection}: no relationships declared")))?;
        let relationship = relationships.get(name).ok_or_else(|| {
            ProseQLError::operation(format!("{collection}: no relationship named '{name}'"))
        })?;

        let nested_options = match spec {
            PopulateSpec::Default => None,
            PopulateSpec::Options(opts) => Some(opts),
        };
        let optional = relationship.optional || nested_options.is_some_and(|o| o.optional);

        match &relationship.kind {
            RelationshipKind::Ref { target, foreign_key, .. } => {
                let fk_value = record.get(foreign_key).cloned().unwrap_or(Value::Null);
                let resolved = if fk_value.is_null() {
                    Value::Null
                } else {
                    let id = fk_value.to_display_string();
                    let snapshot = lookup
                        .snapshot_of(target)
                        .ok_or_else(|| ProseQLError::operation(format!("unknown collection '{target}'")))?;
                    match snapshot.get(&id) {
                        Some(target_record) => {
                            let mut cloned = target_record.clone();
                            if let Some(opts) = nested_options {
                                apply_nested(target, &mut cloned, opts, lookup)?;
                            }
                            Value::Map(cloned)
                        }
                        None if optional => Value::Null,
                        None => {
                            return Err(DanglingReferenceError::new(target.clone(), name.clone(), id).into());
                        }
                    }
                };
                record.insert(name.clone(), resolved);
            }
            RelationshipKind::Inverse { target, foreign_key } => {
                let this_id = record
                    .get("id")
                    .map(|v| v.to_display_string())
                    .unwrap_or_default();
                let snapshot = lookup
                    .snapshot_of(target)
                    .ok_or_else(|| ProseQLError::operation(format!("unknown collection '{target}'")))?;
                let mut matches: Vec<Record> = snapshot
                    .entities
                    .values()
                    .filter(|r| r.get(foreign_key).map(|v| v.to_display_string()) == Some(this_id.clone()))
                    .cloned()
                    .collect();
                if let Some(opts) = nested_options {
                    for m in &mut matches {
                        apply_nested(target, m, opts, lookup)?;
                    }
                    if !opts.sort.is_empty() {
                        let mut tagged: Vec<(String, Record)> = matches
                            .into_iter()
                            .map(|r| (r.get("id").map(|v| v.to_display_string()).unwrap_or_default(), r))
                            .collect();
                        super::sort::apply_sort(&mut tagged, &opts.sort);
                        matches = tagged.into_iter().map(|(_, r)| r).collect();
                    }
                }
                record.insert(name.clone(), Value::List(matches.into_iter().map(Value::Map).collect()));
            }
        }
    }
    Ok(())
}

fn apply_nested(
    target: &str,
    record: &mut Record,
    opts: &PopulateOptions,
    lookup: &dyn CollectionLookup,
) -> Result<()> {
    if !opts.populate.is_empty() {
        populate_record(target, record, &opts.populate, lookup)?;
    }
    if let Some(select) = &opts.select {
        *record = project::project(record, Some(select));
    }
    Ok(())
}
