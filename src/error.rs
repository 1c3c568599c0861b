//! Error types for the ledger query assistant

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Query Pipeline Errors
    // =============================

    #[error("Query is empty")]
    EmptyQuery,

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Financial data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Completion error: {0}")]
    CompletionError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AssistantError {
    /// Whether the caller should see this as a server-side failure rather
    /// than a fixed user-facing answer.
    pub fn is_fatal_for_request(&self) -> bool {
        matches!(self, AssistantError::UserNotFound(_))
    }
}
