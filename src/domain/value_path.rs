//! Optional path lookup over raw API items
//!
//! IncidentIQ payloads omit optional objects entirely (an asset without a model has
//! no `Model` key at all), so every nested read goes through [`lookup`], which turns
//! a missing key, a non-object intermediate or an explicit JSON `null` into `None`.

use serde_json::Value;

/// Walks `path` into `value`, one object key per segment.
///
/// An empty path returns `value` itself unless it is `null`.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let found = path
        .iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))?;
    (!found.is_null()).then_some(found)
}

/// String at `path`, if present and actually a string
pub fn lookup_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(value, path)?.as_str()
}
