//! Cursor pagination (spec.md §4.6(f)).
//!
//! A cursor token is an opaque, base64-encoded encoding of the paginated
//! key's last-seen value. Malformed tokens are rejected at decode time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Result, ValidationError};
use crate::value::Value;

/// Cursor pagination request: sort/paginate by `key`, starting after `after`
/// (if any), returning up to `page_size` items.
#[derive(Clone, Debug)]
pub struct CursorConfig {
    pub key: String,
    pub after: Option<String>,
    pub page_size: usize,
}

/// The envelope returned alongside a cursor page's items.
#[derive(Clone, Debug, PartialEq)]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Encodes a key value into an opaque cursor token.
pub fn encode_cursor(value: &Value) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    BASE64.encode(json)
}

/// Decodes a cursor token back into the key value it captures.
pub fn decode_cursor(token: &str) -> Result<Value> {
    let bytes = BASE64
        .decode(token)
        .map_err(|e| ValidationError::invalid_query(format!("malformed cursor token: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| ValidationError::invalid_query(format!("malformed cursor token: {e}")))?;
    serde_json::from_str(&text)
        .map_err(|e| ValidationError::invalid_query(format!("malformed cursor token: {e}")).into())
}

/// Slices a key-value-sorted sequence into one cursor page.
///
/// `records` must already be sorted ascending by the cursor key. Returns
/// the page's records (as indices into `records`) plus the page envelope.
pub fn paginate<'a>(
    records: &'a [(String, crate::value::Record)],
    config: &CursorConfig,
) -> Result<(Vec<&'a (String, crate::value::Record)>, PageInfo)> {
    let start_index = match &config.after {
        None => 0,
        Some(token) => {
            let after_value = decode_cursor(token)?;
            records
                .iter()
                .position(|(_, r)| {
                    let v = r.get(&config.key).unwrap_or(&Value::Null);
                    v.natural_cmp(&after_value) == std::cmp::Ordering::Greater
                })
                .unwrap_or(records.len())
        }
    };

    let end_index = (start_index + config.page_size).min(records.len());
    let page: Vec<&(String, crate::value::Record)> = records[start_index..end_index].iter().collect();

    let start_cursor = page
        .first()
        .map(|(_, r)| encode_cursor(r.get(&config.key).unwrap_or(&Value::Null)));
    let end_cursor = page
        .last()
        .map(|(_, r)| encode_cursor(r.get(&config.key).unwrap_or(&Value::Null)));

    let page_info = PageInfo {
        start_cursor,
        end_cursor,
        has_next_page: end_index < records.len(),
        has_previous_page: start_index > 0,
    };

    Ok((page, page_info))
}
