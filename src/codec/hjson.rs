//! Hjson codec (`.hjson`).
//!
//! Decoding uses `deser-hjson`'s relaxed parser (comments, unquoted keys,
//! optional commas). Encoding emits plain JSON, which is valid Hjson input,
//! since `deser-hjson` is decode-only.

use crate::error::SerializationError;
use crate::value::Value;

pub fn encode(value: &Value) -> Result<String, SerializationError> {
    serde_json::to_string_pretty(value).map_err(|e| SerializationError::new("hjson", e.to_string()))
}

pub fn decode(text: &str) -> Result<Value, SerializationError> {
    deser_hjson::from_str(text).map_err(|e| SerializationError::new("hjson", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    #[test]
    fn test_round_trip_map() {
        let mut rec = Record::new();
        rec.insert("id".to_string(), Value::from("1"));
        let value = Value::Map(rec);
        let text = encode(&value).unwrap();
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_decode_unquoted_keys() {
        let text = "{\n  id: 1\n}";
        let decoded = decode(text).unwrap();
        assert_eq!(decoded.get("id"), Some(&Value::from(1.0)));
    }
}
