//! MCP tool surface
//!
//! POST /mcp speaks JSON-RPC 2.0 and exposes two tools to AI agents:
//! `create_wiki` submits a job and waits for it, `check_wiki_status` returns
//! a job record. Tool failures are reported inside a successful JSON-RPC
//! result with `isError: true`; protocol failures use JSON-RPC errors.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    models::DEFAULT_DOC_NAME,
    services::{into_request, COMPLETION_POLL_ATTEMPTS, COMPLETION_POLL_INTERVAL},
    AppState,
};

pub const MCP_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "gaia-orchestrator";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

const STILL_RUNNING_WARNING: &str = "Job still running. Use check_wiki_status to poll.";

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default, rename = "jsonrpc")]
    _jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub params: Option<Value>,
}

fn json_rpc_response(id: Option<Value>, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn json_rpc_error(id: Option<Value>, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

fn tool_text_content(payload: &Value) -> Value {
    json!({
        "type": "text",
        "text": serde_json::to_string_pretty(payload).unwrap_or_else(|_| "{}".to_string()),
    })
}

fn tool_result(outcome: Result<Value, String>) -> Value {
    let (payload, is_error) = match outcome {
        Ok(payload) => (payload, false),
        Err(message) => (json!({ "error": message }), true),
    };
    json!({
        "content": [tool_text_content(&payload)],
        "isError": is_error,
    })
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "create_wiki",
            "description": "Create a structured wiki in ClickUp. Provide a ClickUp URL and a tree \
                of pages with titles and markdown content. Waits for the upload to finish and \
                returns the result.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "ClickUp URL where the wiki should be created. A doc page \
                            URL nests pages under that page, a doc URL adds top-level pages, a \
                            space URL creates a new doc."
                    },
                    "doc_name": {
                        "type": "string",
                        "description": "Title for a new doc (only used for space URLs).",
                        "default": DEFAULT_DOC_NAME
                    },
                    "pages": {
                        "type": "array",
                        "description": "Tree of pages. Each item has 'title', 'content' (markdown) \
                            and optional 'children' with the same structure.",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": {"type": "string"},
                                "content": {"type": "string"},
                                "children": {"type": "array", "items": {"type": "object"}}
                            },
                            "required": ["title"]
                        }
                    }
                },
                "required": ["url", "pages"]
            }
        },
        {
            "name": "check_wiki_status",
            "description": "Check the status of a wiki creation job by its job_id.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "job_id": {"type": "string", "description": "Job ID returned by create_wiki."}
                },
                "required": ["job_id"]
            }
        }
    ])
}

/// POST /mcp
pub async fn mcp_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let value = match payload {
        Ok(Json(value)) => value,
        Err(e) => return Json(json_rpc_error(None, PARSE_ERROR, &e.body_text())).into_response(),
    };
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Json(json_rpc_error(None, INVALID_REQUEST, &e.to_string())).into_response()
        }
    };

    match handle(&state, request).await {
        Some(body) => Json(body).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Dispatch one JSON-RPC request; notifications produce no body
async fn handle(state: &AppState, request: JsonRpcRequest) -> Option<Value> {
    let JsonRpcRequest {
        method, id, params, ..
    } = request;

    if method.starts_with("notifications/") {
        return None;
    }

    let body = match method.as_str() {
        "initialize" => json_rpc_response(
            id,
            json!({
                "protocolVersion": MCP_VERSION,
                "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
                "capabilities": { "tools": {} }
            }),
        ),
        "ping" => json_rpc_response(id, json!({})),
        "tools/list" => json_rpc_response(id, json!({ "tools": tool_definitions() })),
        "tools/call" => {
            let Some(params) = params.as_ref().and_then(Value::as_object) else {
                return Some(json_rpc_error(id, INVALID_PARAMS, "params must be an object"));
            };
            let name = params.get("name").and_then(Value::as_str).unwrap_or("");
            let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

            tracing::info!(tool = name, "MCP tool call");
            let outcome = call_tool(state, name, &args).await;
            if let Err(ref message) = outcome {
                tracing::warn!(tool = name, error = %message, "MCP tool failed");
            }
            json_rpc_response(id, tool_result(outcome))
        }
        other => json_rpc_error(id, METHOD_NOT_FOUND, &format!("Method not found: {}", other)),
    };
    Some(body)
}

async fn call_tool(state: &AppState, name: &str, args: &Value) -> Result<Value, String> {
    match name {
        "create_wiki" => create_wiki_tool(state, args).await,
        "check_wiki_status" => check_status_tool(state, args).await,
        other => Err(format!("Unknown tool: {}", other)),
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).map(str::trim).unwrap_or("")
}

async fn create_wiki_tool(state: &AppState, args: &Value) -> Result<Value, String> {
    let url = str_arg(args, "url");
    if url.is_empty() {
        return Err("Missing required parameter: url".to_string());
    }
    let pages = match args.get("pages") {
        Some(Value::Array(pages)) if !pages.is_empty() => pages.clone(),
        _ => return Err("Missing required parameter: pages (must be non-empty)".to_string()),
    };
    if !state.settings.clickup.has_api_key() {
        return Err("CLICKUP_API_KEY is not configured on the server".to_string());
    }

    let doc_name = match str_arg(args, "doc_name") {
        "" => DEFAULT_DOC_NAME,
        name => name,
    };
    let request = into_request(json!({
        "doc_name": doc_name,
        "target": {"url": url},
        "pages": pages,
    }))
    .map_err(|e| e.to_string())?;

    let submitted = state
        .builder
        .submit(request)
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!(
        job_id = %submitted.job_id,
        total_pages = submitted.total_pages,
        "MCP create_wiki: job started"
    );

    let record = state
        .builder
        .wait_for_completion(
            submitted.job_id,
            COMPLETION_POLL_INTERVAL,
            COMPLETION_POLL_ATTEMPTS,
        )
        .await
        .ok_or_else(|| format!("Job {} disappeared", submitted.job_id))?;

    let mut body = serde_json::to_value(&record).map_err(|e| e.to_string())?;
    if !record.is_terminal() {
        if let Value::Object(map) = &mut body {
            map.insert("warning".to_string(), json!(STILL_RUNNING_WARNING));
        }
    }
    Ok(body)
}

async fn check_status_tool(state: &AppState, args: &Value) -> Result<Value, String> {
    let job_id = str_arg(args, "job_id");
    if job_id.is_empty() {
        return Err("Missing required parameter: job_id".to_string());
    }

    let record = match Uuid::parse_str(job_id) {
        Ok(id) => state.builder.status(id).await,
        Err(_) => None,
    };
    let record = record.ok_or_else(|| format!("Job '{}' not found", job_id))?;
    serde_json::to_value(&record).map_err(|e| e.to_string())
}

/// Build MCP routes
pub fn mcp_routes() -> Router<AppState> {
    Router::new().route("/mcp", post(mcp_endpoint))
}
