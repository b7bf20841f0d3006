//! Masking of sensitive event metadata.
//!
//! Events store their metadata verbatim; masking is applied only when a
//! record crosses the external read boundary. Keys are matched
//! case-insensitively as substrings, so `DB_PASSWORD` and `api_key_v2`
//! both qualify.

use serde_json::Value;

use crate::asset::ExtraMap;

/// Replacement written over sensitive values.
pub const MASK: &str = "***";

const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "access_token",
    "api_key",
    "apikey",
    "authorization",
    "passphrase",
    "passwd",
    "password",
    "private_key",
    "secret",
    "token",
];

/// Returns true when a metadata key should be masked on external reads.
#[must_use]
pub fn is_sensitive_extra_key(key: &str) -> bool {
    let normalized = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| normalized.contains(fragment))
}

/// Returns a copy of the metadata map with sensitive values masked.
///
/// Recurses into nested objects and arrays; non-sensitive values are
/// cloned unchanged.
#[must_use]
pub fn mask_extra(extra: &ExtraMap) -> ExtraMap {
    extra
        .iter()
        .map(|(key, value)| {
            let masked = if is_sensitive_extra_key(key) {
                Value::String(MASK.to_string())
            } else {
                mask_value(value)
            };
            (key.clone(), masked)
        })
        .collect()
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(mask_extra(map)),
        Value::Array(items) => Value::Array(items.iter().map(mask_value).collect()),
        other => other.clone(),
    }
}
