//! Error type shared by the library modules.
//!
//! The CLI and configuration layer use `anyhow`; everything below them
//! returns [`Error`] so callers can tell a rejected input apart from a
//! storage failure.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Campus Connect operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("In-memory store lock poisoned")]
    Poisoned,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }
}
