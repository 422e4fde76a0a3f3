//! Prose codec (`.prose`, §4.10 in kind): a human-readable format driven by
//! a template that interleaves literal text with `{fieldName}` placeholders.
//!
//! A collection's `CollectionConfig` does not carry a per-collection prose
//! template, so this codec derives one from the first record's field order
//! when encoding (`key=value` pairs joined by `" | "`) and writes it as the
//! file's `@prose` directive; decoding parses whatever directive a
//! hand-authored file declares, so externally written prose files still
//! round-trip through the same grammar. A synthetic `@version N` line
//! (ahead of any record lines) carries the persistence pipeline's version
//! marker, since the base grammar has no notion of collection metadata.
//!
//! Fields holding a multi-line string can't fit on the headline, so they're
//! promoted to an overflow template: a single-field template declared as an
//! indented line directly under `@prose`, rendered as its own indented block
//! after each record's headline line. The overflow block's first line is
//! matched against the declared overflow templates in order; any further,
//! deeper-indented lines are continuation lines, appended with `\n` to the
//! last field an overflow template matched. `OVERFLOW_INDENT` and
//! `CONTINUATION_INDENT` fix the two indentation depths this codec writes
//! and expects; a hand-authored file is free to use any two depths as long
//! as the continuation depth is deeper. Lines that match neither the
//! headline nor any overflow template, or indentation with no record or
//! matched field open, are pass-through: parsed past, never reproduced on
//! re-encode.

use crate::error::SerializationError;
use crate::value::{format_number, Record, Value};

const OVERFLOW_INDENT: &str = "  ";
const CONTINUATION_INDENT: &str = "    ";

fn leading_ws_len(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

#[derive(Debug, Clone, PartialEq)]
enum TemplatePart {
    Literal(String),
    Field(String),
}

fn parse_template(spec: &str) -> Result<Vec<TemplatePart>, String> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = spec.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                } else if matches!(parts.last(), Some(TemplatePart::Field(_))) {
                    return Err("adjacent placeholders with no literal separator".to_string());
                }
                let mut name = String::new();
                for c2 in chars.by_ref() {
                    if c2 == '}' {
                        break;
                    }
                    name.push(c2);
                }
                parts.push(TemplatePart::Field(name));
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    Ok(parts)
}

fn render_template(parts: &[TemplatePart], record: &Record) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(lit) => out.push_str(lit),
            TemplatePart::Field(name) => {
                let value = record.get(name.as_str()).unwrap_or(&Value::Null);
                out.push_str(&encode_field_value(value));
            }
        }
    }
    out
}

fn match_template(parts: &[TemplatePart], line: &str) -> Result<Record, String> {
    let mut record = Record::new();
    let mut pos = 0usize;
    let mut i = 0usize;
    while i < parts.len() {
        match &parts[i] {
            TemplatePart::Literal(lit) => {
                if !line[pos..].starts_with(lit.as_str()) {
                    return Err(format!("expected literal '{lit}' at position {pos}"));
                }
                pos += lit.len();
            }
            TemplatePart::Field(name) => {
                let end = match parts.get(i + 1) {
                    Some(TemplatePart::Literal(next_lit)) if !next_lit.is_empty() => line[pos..]
                        .find(next_lit.as_str())
                        .map(|o| pos + o)
                        .ok_or_else(|| format!("field '{name}' has no closing literal"))?,
                    _ => line.len(),
                };
                let raw = line[pos..end].trim();
                record.insert(name.clone(), decode_field_value(raw));
                pos = end;
            }
        }
        i += 1;
    }
    Ok(record)
}

fn encode_field_value(value: &Value) -> String {
    match value {
        Value::Null => "~".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => encode_prose_string(s),
        Value::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => encode_prose_string(s),
                    other => encode_field_value(other),
                })
                .collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Map(_) => "~".to_string(),
    }
}

fn encode_prose_string(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s == "~"
        || s == "true"
        || s == "false"
        || s.starts_with('[')
        || s.contains('|')
        || s.contains(',')
        || s.contains(']')
        || s.contains('"')
        || s.starts_with(' ')
        || s.ends_with(' ')
        || s.parse::<f64>().is_ok();
    if needs_quotes {
        let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        s.to_string()
    }
}

fn decode_field_value(raw: &str) -> Value {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let inner = &raw[1..raw.len() - 1];
        return Value::String(inner.replace("\\\"", "\"").replace("\\\\", "\\"));
    }
    if raw.starts_with('[') && raw.ends_with(']') {
        let inner = &raw[1..raw.len() - 1];
        if inner.trim().is_empty() {
            return Value::List(Vec::new());
        }
        let items = split_list_items(inner)
            .into_iter()
            .map(|item| decode_field_value(item.trim()))
            .collect();
        return Value::List(items);
    }
    match raw {
        "~" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn split_list_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut start = 0usize;
    let bytes = inner.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'[' if !in_quotes => depth += 1,
            b']' if !in_quotes => depth -= 1,
            b',' if !in_quotes && depth == 0 => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);
    items
}

fn derive_headline_template(record: &Record, overflow_fields: &[String]) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    for key in record.keys() {
        if overflow_fields.iter().any(|f| f == key) {
            continue;
        }
        if !parts.is_empty() {
            parts.push(TemplatePart::Literal(" | ".to_string()));
        }
        parts.push(TemplatePart::Literal(format!("{key}=")));
        parts.push(TemplatePart::Field(key.clone()));
    }
    if parts.is_empty() {
        parts.push(TemplatePart::Field("id".to_string()));
    }
    parts
}

/// Field names holding a multi-line string anywhere in the collection;
/// these are rendered as overflow blocks instead of on the headline.
fn overflow_fields_of(map: &Record) -> Vec<String> {
    let mut fields = Vec::new();
    for (key, entry) in map {
        if key == "_version" {
            continue;
        }
        let Some(record) = entry.as_map() else { continue };
        for (field, value) in record {
            if matches!(value, Value::String(s) if s.contains('\n')) && !fields.iter().any(|f| f == field) {
                fields.push(field.clone());
            }
        }
    }
    fields
}

fn headline_template_source(parts: &[TemplatePart]) -> String {
    parts
        .iter()
        .map(|p| match p {
            TemplatePart::Literal(lit) => lit.clone(),
            TemplatePart::Field(name) => format!("{{{name}}}"),
        })
        .collect()
}

pub fn encode(value: &Value) -> Result<String, SerializationError> {
    let map = value
        .as_map()
        .ok_or_else(|| SerializationError::new("prose", "top-level value must be a mapping"))?;

    let version = map.get("_version").and_then(Value::as_f64);
    let first_record = map
        .iter()
        .find(|(k, _)| k.as_str() != "_version")
        .and_then(|(_, v)| v.as_map());

    let overflow_fields = overflow_fields_of(map);
    let template = first_record
        .map(|r| derive_headline_template(r, &overflow_fields))
        .unwrap_or_else(|| vec![TemplatePart::Field("id".to_string())]);
    let overflow_templates: Vec<Vec<TemplatePart>> = overflow_fields
        .iter()
        .map(|f| vec![TemplatePart::Field(f.clone())])
        .collect();

    let mut lines = vec![format!("@prose {}", headline_template_source(&template))];
    for ot in &overflow_templates {
        lines.push(format!("{OVERFLOW_INDENT}{}", headline_template_source(ot)));
    }
    if let Some(v) = version {
        lines.push(format!("@version {}", format_number(v)));
    }
    for (key, entry) in map {
        if key == "_version" {
            continue;
        }
        let record = entry
            .as_map()
            .ok_or_else(|| SerializationError::new("prose", "entity values must be mappings"))?;
        lines.push(render_template(&template, record));

        for field in &overflow_fields {
            let Some(field_value) = record.get(field.as_str()) else {
                continue;
            };
            let text = match field_value {
                Value::String(s) => s.clone(),
                other => other.to_display_string(),
            };
            let mut sub_lines = text.split('\n');
            if let Some(first) = sub_lines.next() {
                // Only the first line goes through the value grammar
                // (matching how a single-field overflow template decodes
                // it); continuation lines are raw appended text.
                let encoded = encode_field_value(&Value::String(first.to_string()));
                lines.push(format!("{OVERFLOW_INDENT}{encoded}"));
            }
            for rest in sub_lines {
                lines.push(format!("{CONTINUATION_INDENT}{rest}"));
            }
        }
    }
    Ok(lines.join("\n"))
}

pub fn decode(text: &str) -> Result<Value, SerializationError> {
    let all_lines: Vec<&str> = text.lines().collect();
    let mut idx = 0usize;
    while idx < all_lines.len() && all_lines[idx].trim().is_empty() {
        idx += 1;
    }
    let directive = all_lines
        .get(idx)
        .ok_or_else(|| SerializationError::new("prose", "empty file, no @prose directive"))?;
    let template_source = directive
        .strip_prefix("@prose ")
        .ok_or_else(|| SerializationError::new("prose", "file must open with an @prose directive"))?;
    let template =
        parse_template(template_source).map_err(|e| SerializationError::new("prose", e))?;
    idx += 1;

    // Indented lines immediately following the directive, all at the same
    // depth, declare the file's overflow templates.
    let mut overflow_templates: Vec<Vec<TemplatePart>> = Vec::new();
    let mut overflow_indent: Option<usize> = None;
    while idx < all_lines.len() {
        let line = all_lines[idx];
        if line.trim().is_empty() {
            break;
        }
        let indent = leading_ws_len(line);
        if indent == 0 {
            break;
        }
        if *overflow_indent.get_or_insert(indent) != indent {
            break;
        }
        let parts =
            parse_template(line.trim_start()).map_err(|e| SerializationError::new("prose", e))?;
        overflow_templates.push(parts);
        idx += 1;
    }

    let mut entities: Record = Record::new();
    let mut version: Option<Value> = None;
    let mut current_id: Option<String> = None;
    let mut last_field: Option<String> = None;

    for line in &all_lines[idx..] {
        let line = *line;
        if line.trim().is_empty() {
            current_id = None;
            last_field = None;
            continue;
        }
        if let Some(rest) = line.strip_prefix("@version ") {
            let v: f64 = rest
                .trim()
                .parse()
                .map_err(|_| SerializationError::new("prose", "malformed @version directive"))?;
            version = Some(Value::from(v));
            continue;
        }

        let indent = leading_ws_len(line);
        if indent > 0 {
            let (Some(base), Some(id)) = (overflow_indent, current_id.as_ref()) else {
                continue; // pass-through: no declared overflow templates or no open record
            };
            let trimmed = line.trim_start();
            let record = entities.get_mut(id).and_then(Value::as_map_mut);
            let Some(record) = record else { continue };

            if indent == base {
                last_field = None;
                for ot in &overflow_templates {
                    if let Ok(fields) = match_template(ot, trimmed) {
                        for (k, v) in fields {
                            record.insert(k.clone(), v);
                            last_field = Some(k);
                        }
                        break;
                    }
                }
            } else if indent > base {
                if let Some(field) = last_field.clone() {
                    let existing = record
                        .get(field.as_str())
                        .map(Value::to_display_string)
                        .unwrap_or_default();
                    record.insert(field, Value::String(format!("{existing}\n{trimmed}")));
                }
                // else: deeper-indented with no matched field open, pass-through
            }
            continue;
        }

        let record =
            match_template(&template, line).map_err(|e| SerializationError::new("prose", e))?;
        let id = record
            .get("id")
            .map(|v| v.to_display_string())
            .ok_or_else(|| SerializationError::new("prose", "record line has no 'id' field"))?;
        entities.insert(id.clone(), Value::Map(record));
        current_id = Some(id);
        last_field = None;
    }

    if let Some(v) = version {
        entities.insert("_version".to_string(), v);
    }
    Ok(Value::Map(entities))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_simple_records() {
        let mut rec1 = Record::new();
        rec1.insert("id".to_string(), Value::from("1"));
        rec1.insert("title".to_string(), Value::from("Dune"));
        rec1.insert("year".to_string(), Value::from(1965.0));

        let mut rec2 = Record::new();
        rec2.insert("id".to_string(), Value::from("2"));
        rec2.insert("title".to_string(), Value::from("Neuromancer"));
        rec2.insert("year".to_string(), Value::from(1984.0));

        let mut map = Record::new();
        map.insert("1".to_string(), Value::Map(rec1));
        map.insert("2".to_string(), Value::Map(rec2));
        let value = Value::Map(map);

        let text = encode(&value).unwrap();
        assert!(text.starts_with("@prose "));
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_version_marker_round_trips() {
        let mut rec = Record::new();
        rec.insert("id".to_string(), Value::from("u1"));
        rec.insert("name".to_string(), Value::from("Alice"));
        let mut map = Record::new();
        map.insert("_version".to_string(), Value::from(3.0));
        map.insert("u1".to_string(), Value::Map(rec));
        let value = Value::Map(map);

        let text = encode(&value).unwrap();
        assert!(text.contains("@version 3"));
        let decoded = decode(&text).unwrap();
        assert_eq!(decoded.get("_version"), Some(&Value::from(3.0)));
    }

    #[test]
    fn test_list_field_round_trips() {
        let mut rec = Record::new();
        rec.insert("id".to_string(), Value::from("1"));
        rec.insert("tags".to_string(), Value::List(vec![Value::from("a"), Value::from("b, c")]));
        let mut map = Record::new();
        map.insert("1".to_string(), Value::Map(rec));
        let value = Value::Map(map);

        let text = encode(&value).unwrap();
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_adjacent_placeholders_rejected() {
        assert!(parse_template("{a}{b}").is_err());
    }

    #[test]
    fn test_pass_through_lines_ignored_on_decode() {
        let text = "@prose id={id}\nid=1\n  a human note here";
        let decoded = decode(text).unwrap();
        assert_eq!(decoded.as_map().unwrap().len(), 1);
    }

    #[test]
    fn test_multiline_field_round_trips() {
        let mut rec1 = Record::new();
        rec1.insert("id".to_string(), Value::from("1"));
        rec1.insert("title".to_string(), Value::from("Dune"));
        rec1.insert(
            "synopsis".to_string(),
            Value::from("A desert planet.\nSpice must flow.\nHouses vie for power."),
        );

        let mut rec2 = Record::new();
        rec2.insert("id".to_string(), Value::from("2"));
        rec2.insert("title".to_string(), Value::from("Neuromancer"));
        rec2.insert("synopsis".to_string(), Value::from("A single line is enough."));

        let mut map = Record::new();
        map.insert("1".to_string(), Value::Map(rec1));
        map.insert("2".to_string(), Value::Map(rec2));
        let value = Value::Map(map);

        let text = encode(&value).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with(OVERFLOW_INDENT));
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_overflow_declarations_and_continuations_parsed_by_indent() {
        let text = concat!(
            "@prose id={id} | title={title}\n",
            "  {notes}\n",
            "id=1 | title=Dune\n",
            "  first overflow line\n",
            "    a continuation line\n",
            "    another continuation line\n",
        );
        let decoded = decode(text).unwrap();
        let rec = decoded.get("1").unwrap();
        assert_eq!(
            rec.get("notes"),
            Some(&Value::from(
                "first overflow line\na continuation line\nanother continuation line"
            ))
        );
    }

    #[test]
    fn test_indentation_with_no_open_record_is_pass_through() {
        let text = concat!(
            "@prose id={id}\n",
            "  {notes}\n",
            "id=1\n",
            "\n",
            "  orphaned overflow line after a blank line\n",
        );
        let decoded = decode(text).unwrap();
        assert_eq!(decoded.as_map().unwrap().len(), 1);
        assert!(decoded.get("1").unwrap().get("notes").is_none());
    }
}
