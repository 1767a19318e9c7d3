//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum CheckError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Search store error: {0}")]
    Search(#[from] reqwest::Error),

    #[error("Search store returned status {status}: {body}")]
    SearchStatus { status: u16, body: String },

    #[error("Schema registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for checker operations
pub type CheckResult<T> = Result<T, CheckError>;
