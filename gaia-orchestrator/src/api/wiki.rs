//! Wiki job API handlers
//!
//! POST /wiki, GET /wiki, GET /wiki/:job_id, GET /wiki/create

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{JobRecord, JobStatus, DEFAULT_DOC_NAME},
    services::{into_request, COMPLETION_POLL_ATTEMPTS, COMPLETION_POLL_INTERVAL},
    AppState,
};

/// POST /wiki response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWikiResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_pages: usize,
    pub message: String,
}

/// GET /wiki/create query
#[derive(Debug, Deserialize)]
pub struct CreateWikiQuery {
    /// ClickUp doc, page or space URL
    pub url: String,
    /// JSON array of pages
    pub pages: String,
    #[serde(default)]
    pub doc_name: Option<String>,
}

/// Fail with 500 when no ClickUp credentials are configured
pub(crate) fn require_api_key(state: &AppState) -> ApiResult<()> {
    if state.settings.clickup.has_api_key() {
        Ok(())
    } else {
        Err(ApiError::Internal(
            "CLICKUP_API_KEY is not configured on the server".to_string(),
        ))
    }
}

/// POST /wiki
///
/// Accepts canonical or informal payloads and starts a background job.
/// Returns 202 Accepted with the job id.
pub async fn create_wiki(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateWikiResponse>)> {
    require_api_key(&state)?;

    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = into_request(payload)?;

    tracing::info!(
        doc_name = %request.doc_name,
        top_level_pages = request.pages.len(),
        "Received wiki creation request"
    );

    let submitted = state.builder.submit(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateWikiResponse {
            job_id: submitted.job_id,
            status: JobStatus::Queued,
            total_pages: submitted.total_pages,
            message: format!(
                "Wiki creation started. Poll GET /api/v1/wiki/{} for progress.",
                submitted.job_id
            ),
        }),
    ))
}

/// GET /wiki/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    let not_found = || ApiError::NotFound(format!("Job {} not found", job_id));
    let id = Uuid::parse_str(&job_id).map_err(|_| not_found())?;
    state.builder.status(id).await.map(Json).ok_or_else(not_found)
}

/// GET /wiki
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobRecord>> {
    Json(state.builder.list().await)
}

/// GET /wiki/create
///
/// For agents that can only load web pages: starts a job, waits for it to
/// finish and answers with a plain-text report.
pub async fn create_wiki_report(
    State(state): State<AppState>,
    Query(query): Query<CreateWikiQuery>,
) -> Response {
    if !state.settings.clickup.has_api_key() {
        return plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERROR: CLICKUP_API_KEY is not configured on the server.".to_string(),
        );
    }

    let pages = match serde_json::from_str::<Value>(&query.pages) {
        Ok(Value::Array(pages)) if !pages.is_empty() => pages,
        Ok(_) => {
            return plain(
                StatusCode::BAD_REQUEST,
                "ERROR: Invalid pages parameter: pages must be a non-empty JSON array".to_string(),
            )
        }
        Err(e) => {
            return plain(
                StatusCode::BAD_REQUEST,
                format!("ERROR: Invalid pages parameter: {}", e),
            )
        }
    };

    let doc_name = query
        .doc_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DOC_NAME.to_string());

    let payload = json!({
        "doc_name": doc_name,
        "target": {"url": query.url},
        "pages": pages,
    });

    let request = match into_request(payload) {
        Ok(request) => request,
        Err(e) => {
            return plain(
                StatusCode::BAD_REQUEST,
                format!("ERROR: Invalid pages parameter: {}", e),
            )
        }
    };

    let submitted = match state.builder.submit(request).await {
        Ok(submitted) => submitted,
        Err(e) => return plain(StatusCode::BAD_REQUEST, format!("ERROR: {}", e)),
    };
    tracing::info!(
        job_id = %submitted.job_id,
        total_pages = submitted.total_pages,
        "GET wiki/create: job started"
    );

    let finished = state
        .builder
        .wait_for_completion(
            submitted.job_id,
            COMPLETION_POLL_INTERVAL,
            COMPLETION_POLL_ATTEMPTS,
        )
        .await;

    match finished {
        Some(record) => plain(StatusCode::OK, record.render_report()),
        None => plain(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ERROR: Job {} not found.", submitted.job_id),
        ),
    }
}

fn plain(status: StatusCode, body: String) -> Response {
    (status, body).into_response()
}

/// Build wiki job routes
pub fn wiki_routes() -> Router<AppState> {
    Router::new()
        .route("/wiki", post(create_wiki).get(list_jobs))
        .route("/wiki/create", get(create_wiki_report))
        .route("/wiki/:job_id", get(get_job))
}
