//! TOON codec (`.toon`): a compact, indentation-based format with no mature
//! ecosystem crate, implemented first-party.
//!
//! Maps render as `key: value` lines (or `key:` followed by a nested,
//! further-indented block for non-empty containers); lists render as `-`
//! lines, scalars inline after the dash, containers as a nested block.
//! Indentation is two spaces per level.

use crate::error::SerializationError;
use crate::value::{format_number, Record, Value};

const INDENT_UNIT: usize = 2;

pub fn encode(value: &Value) -> Result<String, SerializationError> {
    let mut out = Vec::new();
    encode_node(value, 0, &mut out);
    Ok(out.join("\n"))
}

pub fn decode(text: &str) -> Result<Value, SerializationError> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return Ok(Value::Map(Record::new()));
    }
    let (value, _) = parse_block(&lines, 0, 0)
        .map_err(|e| SerializationError::new("toon", e))?;
    Ok(value)
}

fn pad(indent: usize) -> String {
    " ".repeat(indent)
}

fn is_container_non_empty(v: &Value) -> bool {
    matches!(v, Value::Map(m) if !m.is_empty()) || matches!(v, Value::List(l) if !l.is_empty())
}

fn encode_scalar_or_empty(v: &Value) -> String {
    match v {
        Value::Map(m) if m.is_empty() => "{}".to_string(),
        Value::List(l) if l.is_empty() => "[]".to_string(),
        _ => encode_scalar(v),
    }
}

fn encode_scalar(v: &Value) -> String {
    match v {
        Value::Null => "~".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => encode_string_scalar(s),
        _ => String::new(),
    }
}

fn encode_string_scalar(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s == "~"
        || s == "true"
        || s == "false"
        || s.starts_with(' ')
        || s.ends_with(' ')
        || s.starts_with('-')
        || s.contains(':')
        || s.parse::<f64>().is_ok();
    if needs_quotes {
        let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        s.to_string()
    }
}

fn decode_scalar(s: &str) -> Value {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        return Value::String(inner.replace("\\\"", "\"").replace("\\\\", "\\"));
    }
    match s {
        "~" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => s.parse::<f64>().map(Value::Number).unwrap_or_else(|_| Value::String(s.to_string())),
    }
}

fn encode_node(value: &Value, indent: usize, out: &mut Vec<String>) {
    match value {
        Value::Map(m) => {
            for (key, val) in m {
                encode_map_entry(key, val, indent, out);
            }
        }
        Value::List(items) => {
            for item in items {
                encode_list_entry(item, indent, out);
            }
        }
        scalar => out.push(format!("{}{}", pad(indent), encode_scalar(scalar))),
    }
}

fn encode_map_entry(key: &str, val: &Value, indent: usize, out: &mut Vec<String>) {
    if is_container_non_empty(val) {
        out.push(format!("{}{}:", pad(indent), key));
        encode_node(val, indent + INDENT_UNIT, out);
    } else {
        out.push(format!("{}{}: {}", pad(indent), key, encode_scalar_or_empty(val)));
    }
}

fn encode_list_entry(item: &Value, indent: usize, out: &mut Vec<String>) {
    if is_container_non_empty(item) {
        out.push(format!("{}-", pad(indent)));
        encode_node(item, indent + INDENT_UNIT, out);
    } else {
        out.push(format!("{}- {}", pad(indent), encode_scalar_or_empty(item)));
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn parse_block(lines: &[&str], idx: usize, indent: usize) -> Result<(Value, usize), String> {
    if idx >= lines.len() {
        return Ok((Value::Map(Record::new()), idx));
    }
    let trimmed = lines[idx].trim_start();
    if trimmed == "-" || trimmed.starts_with("- ") {
        let (items, next) = parse_list(lines, idx, indent)?;
        Ok((Value::List(items), next))
    } else {
        let (record, next) = parse_map(lines, idx, indent)?;
        Ok((Value::Map(record), next))
    }
}

fn parse_list(lines: &[&str], mut idx: usize, indent: usize) -> Result<(Vec<Value>, usize), String> {
    let mut items = Vec::new();
    while idx < lines.len() && indent_of(lines[idx]) == indent {
        let trimmed = lines[idx].trim_start();
        if !(trimmed == "-" || trimmed.starts_with("- ")) {
            break;
        }
        let rest = trimmed.strip_prefix('-').unwrap().trim_start();
        if rest.is_empty() {
            idx += 1;
            if idx < lines.len() && indent_of(lines[idx]) > indent {
                let (val, next) = parse_block(lines, idx, indent + INDENT_UNIT)?;
                items.push(val);
                idx = next;
            } else {
                items.push(Value::Map(Record::new()));
            }
        } else if rest == "{}" {
            items.push(Value::Map(Record::new()));
            idx += 1;
        } else if rest == "[]" {
            items.push(Value::List(Vec::new()));
            idx += 1;
        } else {
            items.push(decode_scalar(rest));
            idx += 1;
        }
    }
    Ok((items, idx))
}

fn parse_map(lines: &[&str], mut idx: usize, indent: usize) -> Result<(Record, usize), String> {
    let mut record = Record::new();
    while idx < lines.len() && indent_of(lines[idx]) == indent {
        let trimmed = lines[idx].trim_start();
        if trimmed.starts_with('-') {
            break;
        }
        if let Some(key) = trimmed.strip_suffix(':') {
            idx += 1;
            if idx < lines.len() && indent_of(lines[idx]) > indent {
                let (val, next) = parse_block(lines, idx, indent + INDENT_UNIT)?;
                record.insert(key.to_string(), val);
                idx = next;
            } else {
                record.insert(key.to_string(), Value::Map(Record::new()));
            }
        } else if let Some(pos) = trimmed.find(": ") {
            let key = &trimmed[..pos];
            let rest = &trimmed[pos + 2..];
            let val = match rest {
                "{}" => Value::Map(Record::new()),
                "[]" => Value::List(Vec::new()),
                _ => decode_scalar(rest),
            };
            record.insert(key.to_string(), val);
            idx += 1;
        } else {
            return Err(format!("malformed toon line: {trimmed}"));
        }
    }
    Ok((record, idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_flat_map() {
        let mut rec = Record::new();
        rec.insert("id".to_string(), Value::from("1"));
        rec.insert("title".to_string(), Value::from("Dune"));
        rec.insert("year".to_string(), Value::from(1965.0));
        let value = Value::Map(rec);
        let text = encode(&value).unwrap();
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_round_trip_nested() {
        let mut inner = Record::new();
        inner.insert("id".to_string(), Value::from("1"));
        inner.insert("tags".to_string(), Value::List(vec![Value::from("a"), Value::from("b")]));
        let mut outer = Record::new();
        outer.insert("1".to_string(), Value::Map(inner));
        let value = Value::Map(outer);
        let text = encode(&value).unwrap();
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_string_needing_quotes_round_trips() {
        let mut rec = Record::new();
        rec.insert("note".to_string(), Value::from("has: colon"));
        let value = Value::Map(rec);
        let text = encode(&value).unwrap();
        assert!(text.contains("\"has: colon\""));
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_null_round_trips() {
        let mut rec = Record::new();
        rec.insert("deletedAt".to_string(), Value::Null);
        let value = Value::Map(rec);
        let text = encode(&value).unwrap();
        assert_eq!(decode(&text).unwrap(), value);
    }
}
