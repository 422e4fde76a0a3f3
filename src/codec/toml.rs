//! TOML codec. TOML requires a top-level table; a non-map value is an error.

use crate::error::SerializationError;
use crate::value::Value;

pub fn encode(value: &Value) -> Result<String, SerializationError> {
    match value {
        Value::Map(_) => {
            toml::to_string_pretty(value).map_err(|e| SerializationError::new("toml", e.to_string()))
        }
        _ => Err(SerializationError::new(
            "toml",
            "TOML requires a top-level table; wrap list-only collections",
        )),
    }
}

pub fn decode(text: &str) -> Result<Value, SerializationError> {
    toml::from_str(text).map_err(|e| SerializationError::new("toml", e.to_string()))
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
        assert_eq!(decode(&text).unwrap(), value);
    }

    #[test]
    fn test_non_map_rejected() {
        assert!(encode(&Value::List(vec![Value::from(1.0)])).is_err());
    }
}
