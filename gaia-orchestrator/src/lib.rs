//! gaia-orchestrator library interface
//!
//! Turns structured wiki descriptions into ClickUp docs and page trees.
//! Job state is held in memory only; restarting the service forgets every
//! job.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::{middleware, Router};
use chrono::{DateTime, Utc};
use gaia_common::Settings;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::{DocumentService, JobStore, WikiBuilder};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Read-only configuration
    pub settings: Arc<Settings>,
    /// Job orchestrator; owns the in-memory job store
    pub builder: WikiBuilder,
    /// Remote document service used by the webhook task lookup
    pub documents: Arc<dyn DocumentService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(settings: Settings, documents: Arc<dyn DocumentService>) -> Self {
        Self {
            settings: Arc::new(settings),
            builder: WikiBuilder::new(documents.clone(), JobStore::new()),
            documents,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(api::wiki_routes())
        .merge(api::webhook_routes())
        .merge(api::mcp_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_api_secret,
        ));

    Router::new()
        .nest("/api/v1", protected.merge(api::health_routes()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
