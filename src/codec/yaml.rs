//! YAML codec (`.yaml` / `.yml`).

use crate::error::SerializationError;
use crate::value::Value;

pub fn encode(value: &Value) -> Result<String, SerializationError> {
    serde_yaml::to_string(value).map_err(|e| SerializationError::new("yaml", e.to_string()))
}

pub fn decode(text: &str) -> Result<Value, SerializationError> {
    serde_yaml::from_str(text).map_err(|e| SerializationError::new("yaml", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    #[test]
    fn test_round_trip_map() {
        let mut rec = Record::new();
        rec.insert("id".to_string(), Value::from("1"));
        rec.insert("year".to_string(), Value::from(1965.0));
        let value = Value::Map(rec);
        let text = encode(&value).unwrap();
        assert_eq!(decode(&text).unwrap(), value);
    }
}
