//! Webhook ingestion
//!
//! Automation webhooks arrive in many shapes: the wiki payload itself, a
//! payload hidden in a description field, a `payload` query parameter, free
//! text with JSON in it, or only a task id whose description holds the
//! payload. Sources are tried in a fixed order and the first payload found
//! wins.
//!
//! The webhook always acknowledges with a status object; failures are
//! reported in the body so the automation does not retry.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::clickup_client::DocumentService;
use super::payload_extractor::{extract_from_candidates, extract_wiki_json};
use super::payload_normalizer::into_request;
use super::wiki_builder::WikiBuilder;

/// Object fields that commonly carry the task description
pub const DESCRIPTION_FIELDS: [&str; 7] = [
    "task_description",
    "description",
    "Task Description",
    "task_content",
    "content",
    "body",
    "text",
];

/// String values shorter than this are not worth scanning
const MIN_SCAN_CHARS: usize = 20;

/// Raw bodies shorter than this cannot hold a payload
const MIN_RAW_TEXT_CHARS: usize = 10;

const MIN_TASK_ID_CHARS: usize = 5;

/// Where the wiki payload was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    Body,
    QueryParam,
    RawText,
    Task(String),
}

impl PayloadSource {
    pub fn describe(&self) -> String {
        match self {
            PayloadSource::Body => "request body".to_string(),
            PayloadSource::QueryParam => "payload query parameter".to_string(),
            PayloadSource::RawText => "raw body text".to_string(),
            PayloadSource::Task(id) => format!("task {}", id),
        }
    }
}

/// What the webhook did with a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Empty or sample delivery, such as the "test webhook" button
    TestPing,
    /// No payload anywhere
    Ignored { reason: String },
    /// A payload was found but could not become a job
    Invalid { message: String },
    Accepted {
        job_id: Uuid,
        total_pages: usize,
        source: PayloadSource,
    },
}

/// Run a webhook delivery through every payload source in order
pub async fn handle_webhook(
    builder: &WikiBuilder,
    documents: &dyn DocumentService,
    body_text: &str,
    payload_param: Option<&str>,
) -> WebhookOutcome {
    let data = parse_body(body_text);

    if is_test_ping(body_text, &data) {
        tracing::info!("Webhook: test or empty delivery");
        return WebhookOutcome::TestPing;
    }

    let Some((payload, source)) = locate_payload(documents, &data, body_text, payload_param).await
    else {
        tracing::warn!("Webhook: no wiki payload found");
        return WebhookOutcome::Ignored {
            reason: "no wiki JSON payload found".to_string(),
        };
    };

    tracing::info!(source = %source.describe(), "Webhook: wiki payload found");

    let request = match into_request(payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, source = %source.describe(), "Webhook: invalid payload");
            return WebhookOutcome::Invalid {
                message: e.to_string(),
            };
        }
    };

    match builder.submit(request).await {
        Ok(submitted) => {
            tracing::info!(
                job_id = %submitted.job_id,
                total_pages = submitted.total_pages,
                "Webhook: job started"
            );
            WebhookOutcome::Accepted {
                job_id: submitted.job_id,
                total_pages: submitted.total_pages,
                source,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook: request rejected");
            WebhookOutcome::Invalid {
                message: e.to_string(),
            }
        }
    }
}

async fn locate_payload(
    documents: &dyn DocumentService,
    data: &Map<String, Value>,
    body_text: &str,
    payload_param: Option<&str>,
) -> Option<(Value, PayloadSource)> {
    if let Some(payload) = find_payload_in_object(data) {
        return Some((payload, PayloadSource::Body));
    }

    if let Some(param) = payload_param.filter(|p| !p.trim().is_empty()) {
        tracing::debug!(chars = param.len(), "Webhook: trying payload query parameter");
        if let Ok(extracted) = extract_wiki_json(param) {
            return Some((extracted.value, PayloadSource::QueryParam));
        }
    }

    if body_text.trim().chars().count() >= MIN_RAW_TEXT_CHARS {
        if let Ok(extracted) = extract_wiki_json(body_text) {
            return Some((extracted.value, PayloadSource::RawText));
        }
    }

    match extract_task_id(data) {
        Some(task_id) => {
            tracing::info!(task_id = %task_id, "Webhook: fetching task description");
            let payload = payload_from_task(documents, &task_id).await?;
            Some((payload, PayloadSource::Task(task_id)))
        }
        None => {
            tracing::info!("Webhook: no task id in delivery");
            None
        }
    }
}

/// Parse the body as a JSON object; an array contributes its first object
fn parse_body(body_text: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(body_text) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Array(items)) => match items.into_iter().next() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

/// Empty or sample deliveries, unless they actually carry pages
pub fn is_test_ping(body_text: &str, data: &Map<String, Value>) -> bool {
    let trimmed = body_text.trim();
    let looks_like_test = trimmed.is_empty()
        || matches!(trimmed, "{}" | "[]" | "null" | "test")
        || data.get("event").and_then(Value::as_str) == Some("test");
    looks_like_test && !data.contains_key("pages")
}

/// Find a wiki payload in a JSON object
///
/// The object itself qualifies when it has `pages` plus a target or doc
/// name. Otherwise the known description fields are parsed, then every
/// long string value and nested object is searched.
pub fn find_payload_in_object(data: &Map<String, Value>) -> Option<Value> {
    if data.is_empty() {
        return None;
    }

    let has_location =
        data.contains_key("target") || data.contains_key("target_url") || data.contains_key("doc_name");
    if data.contains_key("pages") && has_location {
        return Some(Value::Object(data.clone()));
    }

    for field in DESCRIPTION_FIELDS {
        if let Some(text) = data.get(field).and_then(Value::as_str) {
            if let Ok(extracted) = extract_wiki_json(text) {
                tracing::debug!(field, "Payload found in description field");
                return Some(extracted.value);
            }
        }
    }

    for (key, value) in data {
        let found = match value {
            Value::String(text) if text.chars().count() > MIN_SCAN_CHARS => {
                extract_wiki_json(text).ok().map(|e| e.value)
            }
            Value::Object(nested) => find_payload_in_object(nested),
            _ => None,
        };
        if found.is_some() {
            tracing::debug!(field = %key, "Payload found by scanning");
            return found;
        }
    }

    None
}

/// Task id from the known webhook shapes, in priority order
pub fn extract_task_id(data: &Map<String, Value>) -> Option<String> {
    let nested_id = |key: &str| data.get(key).and_then(|v| v.get("id"));

    let candidates = [
        nested_id("payload"),
        data.get("task_id"),
        data.get("taskId"),
        nested_id("task"),
        data.get("history_items")
            .and_then(|h| h.get(0))
            .and_then(|item| item.get("after"))
            .and_then(|after| after.get("id")),
    ];

    candidates.into_iter().flatten().find_map(task_id_string)
}

/// A plausible task id: 5+ chars of `[A-Za-z0-9_-]`, not a placeholder
///
/// The id ends up in a request path, so anything else is refused.
pub fn is_valid_task_id(id: &str) -> bool {
    let id = id.trim();
    id.chars().count() >= MIN_TASK_ID_CHARS
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !matches!(id, "null" | "undefined")
}

fn task_id_string(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    is_valid_task_id(&id).then_some(id)
}

/// Fetch a task and extract a payload from its text fields
pub async fn payload_from_task(documents: &dyn DocumentService, task_id: &str) -> Option<Value> {
    let task = match documents.get_task(task_id).await {
        Ok(task) => task,
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "Failed to fetch task");
            return None;
        }
    };

    match extract_from_candidates(task.candidates()) {
        Ok((field, extracted)) => {
            tracing::info!(task_id = %task_id, name = %task.name, field, "Payload found in task");
            Some(extracted.value)
        }
        Err(_) => {
            tracing::warn!(task_id = %task_id, name = %task.name, "Task holds no wiki JSON");
            None
        }
    }
}
