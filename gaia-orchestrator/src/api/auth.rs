//! Shared-secret authentication
//!
//! When `server.api_secret` is set, protected routes require a matching
//! `X-Api-Secret` header. A blank secret disables the check.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::ApiError, AppState};

pub const API_SECRET_HEADER: &str = "x-api-secret";

/// Reject requests whose `X-Api-Secret` does not match the configured secret
pub async fn require_api_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state.settings.server.api_secret.as_str();
    if expected.is_empty() {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(API_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided != Some(expected) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with bad API secret");
        return Err(ApiError::Unauthorized(
            "Invalid or missing X-Api-Secret header".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
