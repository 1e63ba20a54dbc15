//! ClickUp Automation webhook
//!
//! POST /webhook/clickup accepts any body. Apart from a missing API key,
//! every outcome is a 200 with a `status` field, so the automation does
//! not keep retrying deliveries it cannot fix.

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wiki::require_api_key;
use crate::{error::ApiResult, services::WebhookOutcome, AppState};

const TEST_PING_MESSAGE: &str =
    "Webhook received successfully. Send a task with wiki JSON in the description to create pages.";

const IGNORED_MESSAGE: &str = "No wiki JSON payload found. Ensure the task description contains \
     JSON like: {\"doc_name\": \"...\", \"target\": {\"url\": \"...\"}, \"pages\": [...]}";

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub payload: Option<String>,
}

/// Webhook acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// ok | ignored | error | accepted
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl WebhookResponse {
    fn status_only(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
            job_id: None,
            total_pages: None,
            source: None,
        }
    }
}

impl From<WebhookOutcome> for WebhookResponse {
    fn from(outcome: WebhookOutcome) -> Self {
        match outcome {
            WebhookOutcome::TestPing => Self::status_only("ok", TEST_PING_MESSAGE),
            WebhookOutcome::Ignored { .. } => Self::status_only("ignored", IGNORED_MESSAGE),
            WebhookOutcome::Invalid { message } => {
                Self::status_only("error", format!("Invalid wiki payload: {}", message))
            }
            WebhookOutcome::Accepted {
                job_id,
                total_pages,
                source,
            } => Self {
                status: "accepted".to_string(),
                message: "Wiki creation started".to_string(),
                job_id: Some(job_id),
                total_pages: Some(total_pages),
                source: Some(source.describe()),
            },
        }
    }
}

/// POST /webhook/clickup
pub async fn clickup_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let body_text = String::from_utf8_lossy(&body);
    let preview: String = body_text.chars().take(500).collect();
    tracing::info!(bytes = body.len(), body = %preview, "Webhook received");

    require_api_key(&state)?;

    let outcome = crate::services::handle_webhook(
        &state.builder,
        state.documents.as_ref(),
        &body_text,
        query.payload.as_deref(),
    )
    .await;

    Ok(Json(outcome.into()))
}

/// Build webhook routes
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook/clickup", post(clickup_webhook))
}
