//! ClickUp API client
//!
//! Teams and tasks come from API v2; docs and pages from API v3. Every call
//! goes through the client's [`PacingGate`] and [`RetryPolicy`], so callers
//! only ever see a terminal [`ClientError`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use gaia_common::Settings;

use super::retry_policy::{PacingGate, RetryPolicy};

const USER_AGENT: &str = concat!("gaia-orchestrator/", env!("CARGO_PKG_VERSION"));

/// Appended to content cut at the size limit
pub const TRUNCATION_NOTICE: &str = "\n\n---\n*Content truncated due to size limits.*";

/// Failure of a single HTTP attempt, before retry classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("response decode error: {0}")]
    Decode(String),
}

impl AttemptError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Terminal outcome of a remote call after retries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("ClickUp rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("ClickUp unavailable after {attempts} attempts: {message}")]
    Unavailable {
        status: Option<u16>,
        attempts: u32,
        message: String,
    },

    #[error("unexpected ClickUp response: {0}")]
    Decode(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// True when the same call may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Unavailable { .. })
    }
}

/// A ClickUp workspace (v2 "team")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDoc {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePage {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

/// Text fields of a task that may carry a wiki payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskText {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub markdown_description: Option<String>,
}

impl TaskText {
    /// Non-blank text fields, most reliable first
    pub fn candidates(&self) -> Vec<(&'static str, &str)> {
        [
            ("text_content", self.text_content.as_deref()),
            ("description", self.description.as_deref()),
            ("markdown_description", self.markdown_description.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, text)| text.filter(|t| !t.trim().is_empty()).map(|t| (name, t)))
        .collect()
    }
}

#[derive(Deserialize)]
struct TeamsResponse {
    #[serde(default)]
    teams: Vec<Workspace>,
}

/// Remote document operations used by the wiki builder
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>, ClientError>;

    /// Create a doc in `space_id`
    async fn create_doc(
        &self,
        workspace_id: &str,
        name: &str,
        space_id: &str,
    ) -> Result<RemoteDoc, ClientError>;

    /// Create a page; `parent_page_id = None` puts it at the doc root
    async fn create_page(
        &self,
        workspace_id: &str,
        doc_id: &str,
        title: &str,
        content: &str,
        parent_page_id: Option<&str>,
    ) -> Result<RemotePage, ClientError>;

    async fn get_doc(&self, workspace_id: &str, doc_id: &str) -> Result<RemoteDoc, ClientError>;

    async fn get_task(&self, task_id: &str) -> Result<TaskText, ClientError>;
}

/// HTTP implementation of [`DocumentService`]
pub struct ClickUpClient {
    http_client: reqwest::Client,
    api_base: String,
    pacing: Arc<PacingGate>,
    retry: RetryPolicy,
    max_content_size: usize,
}

impl ClickUpClient {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(settings.clickup.api_key.trim())
            .map_err(|e| ClientError::Config(format!("invalid API key header: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(settings.clickup.request_timeout())
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: settings.clickup.api_base.trim_end_matches('/').to_string(),
            pacing: Arc::new(PacingGate::new(settings.upload.delay())),
            retry: RetryPolicy::from_config(&settings.retry),
            max_content_size: settings.upload.max_content_size,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn v2(&self, path: &str) -> String {
        format!("{}/api/v2{}", self.api_base, path)
    }

    fn v3(&self, path: &str) -> String {
        format!("{}/api/v3{}", self.api_base, path)
    }

    /// Send one request per attempt, paced and retried
    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: reqwest::Method,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<T, ClientError> {
        self.retry
            .run(operation, || {
                let method = method.clone();
                let url = url.clone();
                let body = body.clone();
                async move {
                    self.pacing.wait().await;
                    tracing::debug!(operation, method = %method, url = %url, "ClickUp request");

                    let mut request = self.http_client.request(method, &url);
                    if let Some(body) = &body {
                        request = request.json(body);
                    }

                    let response = request
                        .send()
                        .await
                        .map_err(|e| AttemptError::Transport(e.to_string()))?;

                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(AttemptError::Status {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    response
                        .json::<T>()
                        .await
                        .map_err(|e| AttemptError::Decode(e.to_string()))
                }
            })
            .await
    }
}

#[async_trait]
impl DocumentService for ClickUpClient {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>, ClientError> {
        let response: TeamsResponse = self
            .send_json("list_workspaces", reqwest::Method::GET, self.v2("/team"), None)
            .await?;
        Ok(response.teams)
    }

    async fn create_doc(
        &self,
        workspace_id: &str,
        name: &str,
        space_id: &str,
    ) -> Result<RemoteDoc, ClientError> {
        let body = json!({
            "name": name,
            "parent": {"id": space_id, "type": 4},
        });
        let doc: RemoteDoc = self
            .send_json(
                "create_doc",
                reqwest::Method::POST,
                self.v3(&format!("/workspaces/{}/docs", workspace_id)),
                Some(body),
            )
            .await?;
        tracing::info!(doc_id = %doc.id, name = %name, space_id = %space_id, "Created doc");
        Ok(doc)
    }

    async fn create_page(
        &self,
        workspace_id: &str,
        doc_id: &str,
        title: &str,
        content: &str,
        parent_page_id: Option<&str>,
    ) -> Result<RemotePage, ClientError> {
        let content = truncate_content(content, self.max_content_size);
        let mut body = json!({
            "name": title,
            "content": content,
        });
        if let Some(parent) = parent_page_id {
            body["parent_page_id"] = json!(parent);
        }

        self.send_json(
            "create_page",
            reqwest::Method::POST,
            self.v3(&format!("/workspaces/{}/docs/{}/pages", workspace_id, doc_id)),
            Some(body),
        )
        .await
    }

    async fn get_doc(&self, workspace_id: &str, doc_id: &str) -> Result<RemoteDoc, ClientError> {
        self.send_json(
            "get_doc",
            reqwest::Method::GET,
            self.v3(&format!("/workspaces/{}/docs/{}", workspace_id, doc_id)),
            None,
        )
        .await
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskText, ClientError> {
        self.send_json(
            "get_task",
            reqwest::Method::GET,
            self.v2(&format!("/task/{}?include_markdown_description=true", task_id)),
            None,
        )
        .await
    }
}

/// Cut `content` so it fits in `max_bytes`, including the notice
///
/// The cut lands on a char boundary. Content already within the limit is
/// returned unchanged.
pub fn truncate_content(content: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if content.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(content);
    }

    let with_notice = max_bytes >= TRUNCATION_NOTICE.len();
    let budget = if with_notice {
        max_bytes - TRUNCATION_NOTICE.len()
    } else {
        max_bytes
    };
    let mut cut = budget;
    while cut > 0 && !content.is_char_boundary(cut) {
        cut -= 1;
    }

    tracing::warn!(
        original_bytes = content.len(),
        max_bytes,
        kept_bytes = cut,
        "Page content truncated"
    );

    if !with_notice {
        return std::borrow::Cow::Owned(content[..cut].to_string());
    }

    let mut out = String::with_capacity(cut + TRUNCATION_NOTICE.len());
    out.push_str(&content[..cut]);
    out.push_str(TRUNCATION_NOTICE);
    std::borrow::Cow::Owned(out)
}

/// Accept ids sent either as JSON strings or numbers
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
