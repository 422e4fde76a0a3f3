//! JSON Lines codec (`.jsonl`): one JSON object per line.
//!
//! The top-level value must be a map (a collection's id → record mapping,
//! optionally carrying a `_version` entry). Each line holds one entry: the
//! `_version` marker serializes as `{"_version": N}`; every other entry
//! serializes as its record's fields with an `id` field set to the map key.

use crate::error::SerializationError;
use crate::value::{Record, Value};

pub fn encode(value: &Value) -> Result<String, SerializationError> {
    let map = value
        .as_map()
        .ok_or_else(|| SerializationError::new("jsonl", "top-level value must be a mapping"))?;

    let mut lines = Vec::with_capacity(map.len());
    for (key, entry) in map {
        let line_value = if key == "_version" {
            serde_json::json!({ "_version": entry })
        } else {
            let mut obj = serde_json::Map::new();
            if let Some(fields) = entry.as_map() {
                for (field, field_value) in fields {
                    obj.insert(
                        field.clone(),
                        serde_json::to_value(field_value)
                            .map_err(|e| SerializationError::new("jsonl", e.to_string()))?,
                    );
                }
            }
            obj.insert(
                "id".to_string(),
                serde_json::Value::String(key.clone()),
            );
            serde_json::Value::Object(obj)
        };
        let line = serde_json::to_string(&line_value)
            .map_err(|e| SerializationError::new("jsonl", e.to_string()))?;
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

pub fn decode(text: &str) -> Result<Value, SerializationError> {
    let mut map = Record::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| SerializationError::new("jsonl", e.to_string()))?;
        let mut obj = match parsed {
            serde_json::Value::Object(obj) => obj,
            _ => return Err(SerializationError::new("jsonl", "each line must be a JSON object")),
        };

        if obj.len() == 1 {
            if let Some(version) = obj.remove("_version") {
                let version_value: Value = serde_json::from_value(version)
                    .map_err(|e| SerializationError::new("jsonl", e.to_string()))?;
                map.insert("_version".to_string(), version_value);
                continue;
            }
            obj.insert("_version".to_string(), serde_json::Value::Null);
            obj.remove("_version");
        }

        let id = obj
            .remove("id")
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| SerializationError::new("jsonl", "each record line must carry an 'id' field"))?;

        let mut record = Record::new();
        record.insert("id".to_string(), Value::from(id.as_str()));
        for (field, field_value) in obj {
            let value: Value = serde_json::from_value(field_value)
                .map_err(|e| SerializationError::new("jsonl", e.to_string()))?;
            record.insert(field, value);
        }
        map.insert(id, Value::Map(record));
    }
    Ok(Value::Map(map))
}
