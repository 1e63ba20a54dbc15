//! Payload normalization
//!
//! Agents describe the same request with a handful of informal naming
//! conventions. This module rewrites a parsed JSON value into the canonical
//! [`WikiCreateRequest`] shape:
//!
//! - top-level `target_url: "<url>"` becomes `target: {"url": "<url>"}`
//! - a bare-string `target` becomes `{"url": ...}`
//! - `summary` becomes `content` on every page at every depth, unless the
//!   page already has non-empty `content`
//! - null `content`, `summary` and `children` count as absent
//! - non-object entries in `pages` / `children` are dropped
//!
//! Unknown fields are left alone (serde ignores them). Normalizing an
//! already-canonical value is a no-op.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{RequestError, WikiCreateRequest};

/// Normalization / validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid wiki payload: {0}")]
    Invalid(String),

    #[error("invalid wiki payload: {0}")]
    Request(#[from] RequestError),
}

/// Apply the canonical rewrites in place of `value`
pub fn normalize_payload(value: Value) -> Result<Value, NormalizeError> {
    let Value::Object(mut data) = value else {
        return Err(NormalizeError::NotAnObject);
    };

    if !data.contains_key("target") {
        if let Some(url) = data.remove("target_url") {
            data.insert("target".to_string(), wrap_url(url));
        }
    }

    if let Some(target) = data.get_mut("target") {
        if target.is_string() {
            let url = target.take();
            *target = wrap_url(url);
        }
    }

    if let Some(Value::Array(pages)) = data.get_mut("pages") {
        normalize_pages(pages);
    }

    Ok(Value::Object(data))
}

/// Normalize, check required fields and deserialize into a validated request
pub fn into_request(value: Value) -> Result<WikiCreateRequest, NormalizeError> {
    let value = normalize_payload(value)?;

    for field in ["pages", "target"] {
        match value.get(field) {
            None | Some(Value::Null) => return Err(NormalizeError::MissingField(field)),
            Some(_) => {}
        }
    }

    let request: WikiCreateRequest =
        serde_json::from_value(value).map_err(|e| NormalizeError::Invalid(e.to_string()))?;
    request.validate()?;
    Ok(request)
}

fn wrap_url(url: Value) -> Value {
    let mut target = Map::new();
    target.insert("url".to_string(), url);
    Value::Object(target)
}

fn normalize_pages(pages: &mut Vec<Value>) {
    pages.retain(Value::is_object);
    for page in pages.iter_mut() {
        if let Value::Object(node) = page {
            normalize_page(node);
        }
    }
}

fn normalize_page(node: &mut Map<String, Value>) {
    node.retain(|key, value| {
        !(value.is_null() && matches!(key.as_str(), "content" | "summary" | "children"))
    });

    if let Some(summary) = node.remove("summary") {
        let has_content = match node.get("content") {
            Some(Value::String(content)) => !content.is_empty(),
            Some(_) => true,
            None => false,
        };
        if !has_content {
            node.insert("content".to_string(), summary);
        }
    }
    if let Some(Value::Array(children)) = node.get_mut("children") {
        normalize_pages(children);
    }
}
