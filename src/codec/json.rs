//! JSON codec.

use crate::error::SerializationError;
use crate::value::Value;

pub fn encode(value: &Value) -> Result<String, SerializationError> {
    serde_json::to_string_pretty(value).map_err(|e| SerializationError::new("json", e.to_string()))
}

pub fn decode(text: &str) -> Result<Value, SerializationError> {
    serde_json::from_str(text).map_err(|e| SerializationError::new("json", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    #[test]
    fn test_round_trip_map() {
        let mut rec = Record::new();
        rec.insert("id".to_string(), Value::from("1"));
        rec.insert("title".to_string(), Value::from("Dune"));
        let value = Value::Map(rec);
        let text = encode(&value).unwrap();
        let decoded = decode(&text).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn test_decode_invalid_json_errors() {
        assert!(decode("{not json").is_err());
    }
}
