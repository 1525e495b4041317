//! Deep merge for configuration documents.
//!
//! Later documents extend earlier ones: mappings merge key by key and
//! sequences concatenate. Every other combination is replaced by the
//! incoming value.

use super::types::{ConfigDocument, empty_document};
use serde_json::Value;

/// Deep merge `incoming` into `base`, with `incoming` taking precedence.
///
/// - Mapping + mapping: merged recursively, keys from both are kept
/// - Sequence + sequence: `base` elements followed by `incoming` elements
/// - Anything else (including `null`): `incoming` replaces `base`
///
/// # Example
/// ```
/// use serde_json::json;
/// use bundle_config::config::deep_merge;
///
/// let base = json!({"a": {"x": 1}, "b": [1]});
/// let incoming = json!({"a": {"y": 2}, "b": [2]});
/// assert_eq!(
///     deep_merge(base, incoming),
///     json!({"a": {"x": 1, "y": 2}, "b": [1, 2]})
/// );
/// ```
pub fn deep_merge(base: Value, incoming: Value) -> Value {
    match (base, incoming) {
        (Value::Object(mut base_map), Value::Object(incoming_map)) => {
            for (key, incoming_value) in incoming_map {
                let merged_value = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, incoming_value),
                    None => incoming_value,
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (Value::Array(mut base_items), Value::Array(incoming_items)) => {
            base_items.extend(incoming_items);
            Value::Array(base_items)
        }
        (_, incoming) => incoming,
    }
}

/// Merge documents in order, starting from an empty mapping.
pub fn deep_merge_all(documents: impl IntoIterator<Item = ConfigDocument>) -> ConfigDocument {
    documents.into_iter().fold(empty_document(), deep_merge)
}
