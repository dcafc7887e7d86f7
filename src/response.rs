//! Typed lookups into OSF JSON:API payloads. A missing or mistyped key is a
//! `MalformedResponse` carrying the offending path.

use serde_json::Value;

use crate::error::MirrorError;

pub fn value_at<'a>(value: &'a Value, path: &[&str], url: &str) -> Result<&'a Value, MirrorError> {
    path.iter()
        .try_fold(value, |current, key| current.get(*key))
        .ok_or_else(|| MirrorError::malformed(url, &path.join(".")))
}

pub fn str_at<'a>(value: &'a Value, path: &[&str], url: &str) -> Result<&'a str, MirrorError> {
    value_at(value, path, url)?
        .as_str()
        .ok_or_else(|| MirrorError::malformed(url, &path.join(".")))
}

/// Like [`str_at`], but JSON `null` or an absent key reads as an empty string.
pub fn text_at(value: &Value, path: &[&str], url: &str) -> Result<String, MirrorError> {
    match path.iter().try_fold(value, |current, key| current.get(*key)) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(MirrorError::malformed(url, &path.join("."))),
    }
}

pub fn u64_at(value: &Value, path: &[&str], url: &str) -> Result<u64, MirrorError> {
    value_at(value, path, url)?
        .as_u64()
        .ok_or_else(|| MirrorError::malformed(url, &path.join(".")))
}

/// `relationships.<name>.links.related.href`, the JSON:API link to a sub-resource.
pub fn related_href<'a>(
    record: &'a Value,
    relationship: &str,
    url: &str,
) -> Result<&'a str, MirrorError> {
    str_at(
        record,
        &["relationships", relationship, "links", "related", "href"],
        url,
    )
}

pub fn has_relationship(record: &Value, relationship: &str) -> bool {
    record
        .get("relationships")
        .and_then(|value| value.get(relationship))
        .is_some()
}
