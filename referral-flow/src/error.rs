use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the referral core and its stores.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Why the AI path could not produce a result. Never leaves the adapter.
#[derive(Error, Debug)]
pub enum AdapterFailure {
    #[error("extraction service error: {0}")]
    Service(String),

    #[error("extraction service timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, IntakeError>;
