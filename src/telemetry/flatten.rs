//! # Telemetry Flattener
//!
//! Normalizes a decoded flight log into a single flat key space.
//!
//! ## Key Synthesis
//!
//! | Payload | Emitted key(s) |
//! |---------|----------------|
//! | Object `{field: value, ...}` | `"<category>.<field>"` per field |
//! | Anything else | `"<category>"` |
//!
//! Keys are inserted in document order. When two entries synthesize the same
//! key, the later one overwrites the earlier one.

use serde_json::Value;
use tracing::debug;

use super::{FlatMap, RawTelemetry};

/// Separator between category and field in a synthesized key
pub const KEY_SEPARATOR: char = '.';

/// Flatten raw telemetry into `"<category>.<field>"` keys
///
/// # Arguments
///
/// * `raw` - Decoded telemetry document, category name to payload
///
/// # Returns
///
/// * `FlatMap` - Synthesized keys mapped to the original values
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use uav_log_analyst::telemetry::flatten::flatten;
///
/// let raw = json!({ "GPS[0]": { "Alt": [1, 2, 3] }, "MODE": "AUTO" });
/// let flat = flatten(raw.as_object().unwrap());
///
/// assert_eq!(flat["GPS[0].Alt"], json!([1, 2, 3]));
/// assert_eq!(flat["MODE"], json!("AUTO"));
/// ```
pub fn flatten(raw: &RawTelemetry) -> FlatMap {
    let mut flat = FlatMap::new();

    for (category, payload) in raw {
        match payload {
            Value::Object(fields) => {
                for (field, value) in fields {
                    let key = format!("{}{}{}", category, KEY_SEPARATOR, field);
                    flat.insert(key, value.clone());
                }
            }
            other => {
                flat.insert(category.clone(), other.clone());
            }
        }
    }

    debug!("Flattened {} categories into {} keys", raw.len(), flat.len());
    flat
}
