//! Common error types for Gaia

use thiserror::Error;

/// Common result type for Gaia operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by Gaia crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
