// src/knowledge/normalize.rs — Text and response normalization

use serde_json::Value;

use crate::infra::errors::AvatarError;

/// Response fields that may carry extracted text, in priority order.
pub const CONTENT_FIELDS: [&str; 3] = ["content", "text", "data"];

pub const UNEXPECTED_FORMAT: &str = "unexpected response format";

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_knowledge_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull the extracted text out of a document-extraction response body.
///
/// Accepts a bare JSON string, or an object with a non-empty string in
/// `content`, `text` or `data` (first match wins). Anything else is rejected.
pub fn normalize_extraction_response(body: &Value) -> Result<String, AvatarError> {
    match body {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => CONTENT_FIELDS
            .iter()
            .find_map(|field| match map.get(*field) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
            .ok_or_else(|| AvatarError::Extraction(UNEXPECTED_FORMAT.into())),
        _ => Err(AvatarError::Extraction(UNEXPECTED_FORMAT.into())),
    }
}
