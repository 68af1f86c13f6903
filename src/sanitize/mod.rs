//! Payload sanitizer.
//!
//! Cleans untrusted admin JSON into the shape that is persisted. Every
//! resource has an explicit field allowlist; anything off the list is
//! dropped silently. Malformed values never abort the request — the
//! offending value is dropped and the only failures surfaced are "no valid
//! fields" and missing required fields.

use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{FieldKind, Resource, SEO_PAGE_FIELDS};

/// Recursion limit for the nested page tree.
const MAX_PAGE_DEPTH: usize = 6;

/// Sanitization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    /// A partial update cleaned down to nothing
    NoValidFields,
    /// Create-style payload missing required fields (names listed verbatim)
    MissingFields(Vec<&'static str>),
}

impl std::fmt::Display for SanitizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SanitizeError::NoValidFields => write!(f, "No valid fields provided"),
            SanitizeError::MissingFields(names) => {
                write!(f, "Missing required fields: {}", names.join(", "))
            }
        }
    }
}

impl std::error::Error for SanitizeError {}

impl From<SanitizeError> for AppError {
    fn from(err: SanitizeError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Sanitize `payload` against the resource's allowlist.
///
/// With `allow_partial` (update/upsert) any subset of allowed fields may be
/// present, but at least one must survive cleaning. Without it (create),
/// the resource's required fields must all survive.
pub fn sanitize(
    resource: Resource,
    payload: &Value,
    allow_partial: bool,
) -> Result<Map<String, Value>, SanitizeError> {
    // The pages resource is one free-form bilingual tree, not a field table.
    if resource == Resource::Pages {
        return sanitize_page_tree(payload, 0).ok_or(SanitizeError::NoValidFields);
    }

    let schema = resource.schema();
    let mut cleaned = Map::new();

    if let Some(object) = payload.as_object() {
        for field in schema.fields {
            let Some(value) = object.get(field.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let normalized = match field.kind {
                FieldKind::Text => scalar_string(value).map(Value::String),
                FieldKind::Bilingual => normalize_bilingual(value),
                FieldKind::BilingualList => normalize_bilingual_list(value),
                FieldKind::Stats => normalize_stats(value),
                FieldKind::Slug => normalize_slug(value).map(Value::String),
                FieldKind::Keywords => normalize_keywords(value),
                FieldKind::SeoPages => normalize_seo_pages(value),
            };
            if let Some(normalized) = normalized {
                cleaned.insert(field.name.to_string(), normalized);
            }
        }
    }

    if allow_partial {
        if cleaned.is_empty() {
            return Err(SanitizeError::NoValidFields);
        }
        return Ok(cleaned);
    }

    let missing: Vec<&'static str> = schema
        .required
        .iter()
        .filter(|name| !cleaned.contains_key(**name))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(SanitizeError::MissingFields(missing));
    }

    Ok(cleaned)
}

/// Coerce a scalar to a trimmed non-empty string.
fn scalar_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Normalize a bilingual scalar: a plain string/number, or an object with
/// optional `tr`/`en` string keys. Empty-after-trim values are dropped.
fn normalize_bilingual(value: &Value) -> Option<Value> {
    if value.is_string() || value.is_number() {
        return scalar_string(value).map(Value::String);
    }
    let object = value.as_object()?;
    let mut cleaned = Map::new();
    for lang in ["tr", "en"] {
        if let Some(text) = object.get(lang).and_then(scalar_string) {
            cleaned.insert(lang.to_string(), Value::String(text));
        }
    }
    if cleaned.is_empty() {
        None
    } else {
        Some(Value::Object(cleaned))
    }
}

/// Split a delimited string into trimmed non-empty entries.
fn split_list(text: &str) -> Vec<Value> {
    text.split(['\n', ','])
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| Value::String(entry.to_string()))
        .collect()
}

/// Normalize a single-language list value (array or delimited string).
fn plain_list(value: &Value) -> Option<Vec<Value>> {
    let list = match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(scalar_string)
            .map(Value::String)
            .collect(),
        Value::String(text) => split_list(text),
        _ => return None,
    };
    if list.is_empty() {
        None
    } else {
        Some(list)
    }
}

/// Normalize a bilingual list: an array, a comma/newline-delimited string,
/// or a `{tr, en}` object of either.
fn normalize_bilingual_list(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) | Value::String(_) => plain_list(value).map(Value::Array),
        Value::Object(object) => {
            let mut cleaned = Map::new();
            for lang in ["tr", "en"] {
                if let Some(list) = object.get(lang).and_then(plain_list) {
                    cleaned.insert(lang.to_string(), Value::Array(list));
                }
            }
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        _ => None,
    }
}

/// Normalize a stats list: `{label, value}` bilingual pairs, dropping
/// entries where both sides clean to nothing.
fn normalize_stats(value: &Value) -> Option<Value> {
    let entries = value.as_array()?;
    let items: Vec<Value> = entries
        .iter()
        .filter_map(|entry| {
            let entry = entry.as_object()?;
            let label = entry.get("label").and_then(normalize_bilingual);
            let stat = entry.get("value").and_then(normalize_bilingual);
            if label.is_none() && stat.is_none() {
                return None;
            }
            let mut pair = Map::new();
            pair.insert(
                "label".to_string(),
                label.unwrap_or_else(|| Value::String(String::new())),
            );
            pair.insert(
                "value".to_string(),
                stat.unwrap_or_else(|| Value::String(String::new())),
            );
            Some(Value::Object(pair))
        })
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(Value::Array(items))
    }
}

/// Normalize a slug: lower-cased, non-alphanumeric runs collapsed to a
/// single hyphen, leading/trailing hyphens stripped.
fn normalize_slug(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let mut slug = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Normalize keywords: an array joined with ", ", or a bilingual scalar.
fn normalize_keywords(value: &Value) -> Option<Value> {
    if let Value::Array(entries) = value {
        let list: Vec<String> = entries.iter().filter_map(scalar_string).collect();
        if list.is_empty() {
            return None;
        }
        return Some(Value::String(list.join(", ")));
    }
    normalize_bilingual(value)
}

/// Sanitize one page entry under `seo.pages` against the flat per-page
/// allowlist. Plain trimmed strings only; keywords arrays are joined.
fn sanitize_seo_page(value: &Value) -> Option<Map<String, Value>> {
    let object = value.as_object()?;
    let mut cleaned = Map::new();
    for key in SEO_PAGE_FIELDS {
        let Some(value) = object.get(*key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if *key == "keywords" {
            match value {
                Value::Array(entries) => {
                    let list: Vec<String> = entries.iter().filter_map(scalar_string).collect();
                    if !list.is_empty() {
                        cleaned.insert(key.to_string(), Value::String(list.join(", ")));
                    }
                }
                Value::String(_) => {
                    if let Some(text) = scalar_string(value) {
                        cleaned.insert(key.to_string(), Value::String(text));
                    }
                }
                _ => {}
            }
            continue;
        }
        if let Some(text) = scalar_string(value) {
            cleaned.insert(key.to_string(), Value::String(text));
        }
    }
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Normalize the `pages` field on the seo resource: a map of page name to
/// per-page SEO object.
fn normalize_seo_pages(value: &Value) -> Option<Value> {
    let object = value.as_object()?;
    let mut pages = Map::new();
    for (name, entry) in object {
        if let Some(cleaned) = sanitize_seo_page(entry) {
            pages.insert(name.clone(), Value::Object(cleaned));
        }
    }
    if pages.is_empty() {
        None
    } else {
        Some(Value::Object(pages))
    }
}

/// Recursively sanitize the bilingual page tree, to a bounded depth.
///
/// Scalars are trimmed, arrays keep non-empty scalars and nested objects,
/// objects recurse. Any level that cleans to empty is omitted so no empty
/// wrapper objects survive.
fn sanitize_page_tree(value: &Value, depth: usize) -> Option<Map<String, Value>> {
    if depth > MAX_PAGE_DEPTH {
        return None;
    }
    let object = value.as_object()?;
    let mut cleaned = Map::new();
    for (key, value) in object {
        match value {
            Value::Null => {}
            Value::String(_) | Value::Number(_) => {
                if let Some(text) = scalar_string(value) {
                    cleaned.insert(key.clone(), Value::String(text));
                }
            }
            Value::Array(entries) => {
                let items: Vec<Value> = entries
                    .iter()
                    .filter_map(|entry| match entry {
                        Value::String(_) | Value::Number(_) => {
                            scalar_string(entry).map(Value::String)
                        }
                        Value::Object(_) => {
                            sanitize_page_tree(entry, depth + 1).map(Value::Object)
                        }
                        _ => None,
                    })
                    .collect();
                if !items.is_empty() {
                    cleaned.insert(key.clone(), Value::Array(items));
                }
            }
            Value::Object(_) => {
                if let Some(nested) = sanitize_page_tree(value, depth + 1) {
                    cleaned.insert(key.clone(), Value::Object(nested));
                }
            }
            _ => {}
        }
    }
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
