//! JSON5 codec, shared by `.json5` and `.jsonc` (JSON with comments is a
//! subset of what the `json5` crate's lenient parser accepts).

use crate::error::SerializationError;
use crate::value::Value;

pub fn encode(value: &Value) -> Result<String, SerializationError> {
    json5::to_string(value).map_err(|e| SerializationError::new("json5", e.to_string()))
}

pub fn decode(text: &str) -> Result<Value, SerializationError> {
    json5::from_str(text).map_err(|e| SerializationError::new("json5", e.to_string()))
}
