//! ClickUp client tests against an in-process stub server
//!
//! The stub binds to an ephemeral localhost port and scripts status codes so
//! retry, rejection and truncation behaviour can be observed end to end.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use gaia_common::Settings;
use gaia_orchestrator::services::{ClickUpClient, ClientError, DocumentService, TRUNCATION_NOTICE};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct StubState {
    /// Page creations answered with `page_status` before succeeding
    page_failures: u32,
    page_status: u16,
    page_attempts: AtomicU32,
    page_bodies: Mutex<Vec<Value>>,
    auth_headers: Mutex<Vec<String>>,
    paths: Mutex<Vec<String>>,
}

type Stub = Arc<StubState>;

async fn teams(State(stub): State<Stub>, headers: HeaderMap) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    stub.auth_headers.lock().unwrap().push(auth);
    Json(json!({"teams": [{"id": 9015, "name": "Acme"}, {"id": "2", "name": "Other"}]}))
}

async fn create_doc(
    State(stub): State<Stub>,
    Path(ws): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    stub.paths.lock().unwrap().push(format!("docs:{}", ws));
    Json(json!({"id": "doc-1", "name": body["name"], "parent": body["parent"]}))
}

async fn create_page(
    State(stub): State<Stub>,
    Path((ws, doc)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let attempt = stub.page_attempts.fetch_add(1, Ordering::SeqCst);
    stub.paths.lock().unwrap().push(format!("pages:{}:{}", ws, doc));
    if attempt < stub.page_failures {
        let status = StatusCode::from_u16(stub.page_status).unwrap();
        return (status, Json(json!({"err": "scripted failure"})));
    }
    stub.page_bodies.lock().unwrap().push(body);
    (StatusCode::OK, Json(json!({"id": format!("page-{}", attempt)})))
}

async fn get_doc() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"err": "Doc not found"})))
}

async fn get_task(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "id": id,
        "name": "Wiki task",
        "text_content": "plain text",
        "description": "desc",
        "markdown_description": "**md**"
    }))
}

async fn spawn_stub(state: StubState) -> (String, Stub) {
    let stub = Arc::new(state);
    let app = Router::new()
        .route("/api/v2/team", get(teams))
        .route("/api/v2/task/:id", get(get_task))
        .route("/api/v3/workspaces/:ws/docs", post(create_doc))
        .route("/api/v3/workspaces/:ws/docs/:doc", get(get_doc))
        .route("/api/v3/workspaces/:ws/docs/:doc/pages", post(create_page))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), stub)
}

fn settings_for(base: &str) -> Settings {
    let mut settings = Settings::default();
    settings.clickup.api_key = "pk_test_key".to_string();
    settings.clickup.api_base = base.to_string();
    settings.upload.delay_ms = 0;
    settings.retry.max_retries = 3;
    settings.retry.base_delay_ms = 5;
    settings
}

#[tokio::test]
async fn test_list_workspaces_sends_api_key() {
    let (base, stub) = spawn_stub(StubState::default()).await;
    let client = ClickUpClient::new(&settings_for(&base)).unwrap();

    let workspaces = client.list_workspaces().await.unwrap();

    assert_eq!(workspaces.len(), 2);
    assert_eq!(workspaces[0].id, "9015");
    assert_eq!(stub.auth_headers.lock().unwrap().as_slice(), ["pk_test_key"]);
}

#[tokio::test]
async fn test_create_doc_in_space() {
    let (base, stub) = spawn_stub(StubState::default()).await;
    let client = ClickUpClient::new(&settings_for(&base)).unwrap();

    let doc = client.create_doc("9015", "Handbook", "space-1").await.unwrap();

    assert_eq!(doc.id, "doc-1");
    assert_eq!(doc.name, "Handbook");
    assert_eq!(stub.paths.lock().unwrap().as_slice(), ["docs:9015"]);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let (base, stub) = spawn_stub(StubState {
        page_failures: 2,
        page_status: 503,
        ..StubState::default()
    })
    .await;
    let client = ClickUpClient::new(&settings_for(&base)).unwrap();

    let page = client
        .create_page("1", "d", "Title", "body", Some("parent-1"))
        .await
        .unwrap();

    assert_eq!(page.id, "page-2");
    assert_eq!(stub.page_attempts.load(Ordering::SeqCst), 3);
    let bodies = stub.page_bodies.lock().unwrap();
    assert_eq!(bodies[0]["name"], "Title");
    assert_eq!(bodies[0]["content"], "body");
    assert_eq!(bodies[0]["parent_page_id"], "parent-1");
}

#[tokio::test]
async fn test_retries_exhausted_is_unavailable() {
    let (base, stub) = spawn_stub(StubState {
        page_failures: 100,
        page_status: 429,
        ..StubState::default()
    })
    .await;
    let client = ClickUpClient::new(&settings_for(&base)).unwrap();

    let err = client.create_page("1", "d", "T", "", None).await.unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(
        err,
        ClientError::Unavailable {
            status: Some(429),
            attempts: 4,
            ..
        }
    ));
    assert_eq!(stub.page_attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_permanent_failure_not_retried() {
    let (base, stub) = spawn_stub(StubState {
        page_failures: 100,
        page_status: 400,
        ..StubState::default()
    })
    .await;
    let client = ClickUpClient::new(&settings_for(&base)).unwrap();

    let err = client.create_page("1", "d", "T", "", None).await.unwrap_err();

    assert!(matches!(err, ClientError::Rejected { status: 400, .. }));
    assert!(!err.is_retryable());
    assert_eq!(stub.page_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_root_page_has_no_parent_field() {
    let (base, stub) = spawn_stub(StubState::default()).await;
    let client = ClickUpClient::new(&settings_for(&base)).unwrap();

    client.create_page("1", "d", "Root", "", None).await.unwrap();

    let bodies = stub.page_bodies.lock().unwrap();
    assert!(bodies[0].get("parent_page_id").is_none());
}

#[tokio::test]
async fn test_oversized_content_is_truncated() {
    let (base, stub) = spawn_stub(StubState::default()).await;
    let mut settings = settings_for(&base);
    settings.upload.max_content_size = 1000;
    let client = ClickUpClient::new(&settings).unwrap();

    let content = "ü".repeat(2000);
    client.create_page("1", "d", "Big", &content, None).await.unwrap();

    let bodies = stub.page_bodies.lock().unwrap();
    let sent = bodies[0]["content"].as_str().unwrap();
    assert!(sent.len() <= 1000);
    assert!(sent.ends_with(TRUNCATION_NOTICE));
}

#[tokio::test]
async fn test_get_doc_not_found_is_rejected() {
    let (base, _) = spawn_stub(StubState::default()).await;
    let client = ClickUpClient::new(&settings_for(&base)).unwrap();

    let err = client.get_doc("1", "missing").await.unwrap_err();

    assert!(matches!(err, ClientError::Rejected { status: 404, .. }));
}

#[tokio::test]
async fn test_get_task_text_fields() {
    let (base, _) = spawn_stub(StubState::default()).await;
    let client = ClickUpClient::new(&settings_for(&base)).unwrap();

    let task = client.get_task("86c8ce274").await.unwrap();

    assert_eq!(task.id, "86c8ce274");
    assert_eq!(task.candidates()[0], ("text_content", "plain text"));
    assert_eq!(task.candidates().len(), 3);
}

#[tokio::test]
async fn test_pacing_spaces_out_requests() {
    let (base, _) = spawn_stub(StubState::default()).await;
    let mut settings = settings_for(&base);
    settings.upload.delay_ms = 150;
    let client = ClickUpClient::new(&settings).unwrap();

    let start = Instant::now();
    for _ in 0..3 {
        client.list_workspaces().await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_millis(290));
}

#[tokio::test]
async fn test_unreachable_host_is_unavailable() {
    // Bind then drop a listener to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut settings = settings_for(&format!("http://{}", addr));
    settings.retry.max_retries = 1;
    let client = ClickUpClient::new(&settings).unwrap();

    let err = client.list_workspaces().await.unwrap_err();

    assert!(matches!(err, ClientError::Unavailable { status: None, attempts: 2, .. }));
}
