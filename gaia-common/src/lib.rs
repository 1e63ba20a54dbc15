//! # Gaia Common Library
//!
//! Shared code for the Gaia wiki orchestrator:
//! - Error types
//! - Layered configuration loading (defaults → TOML → environment)

pub mod config;
pub mod error;

pub use config::Settings;
pub use error::{Error, Result};
