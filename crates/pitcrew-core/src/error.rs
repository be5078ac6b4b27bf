//! Error types shared across the Pitcrew crates.

use thiserror::Error;

/// Result alias used throughout Pitcrew.
pub type Result<T> = std::result::Result<T, PitcrewError>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum PitcrewError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid task transition: {0}")]
    InvalidTransition(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
