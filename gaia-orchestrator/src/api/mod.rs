//! HTTP API handlers
//!
//! All routes are served under `/api/v1`. Wiki, webhook and MCP routes sit
//! behind the shared-secret check; health does not.

pub mod auth;
pub mod health;
pub mod mcp;
pub mod webhook;
pub mod wiki;

pub use auth::{require_api_secret, API_SECRET_HEADER};
pub use health::health_routes;
pub use mcp::mcp_routes;
pub use webhook::webhook_routes;
pub use wiki::wiki_routes;
