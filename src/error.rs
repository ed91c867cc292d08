//! Error taxonomy shared by ingestion, storage, actions and model calls

use thiserror::Error;

/// Notification store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("metadata encoding: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(String),

    #[error("store directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Ingestion failures
///
/// Duplicates are not errors; see [`crate::ingest::IngestOutcome::Duplicate`].
#[derive(Debug, Error)]
pub enum IngestError {
    /// Shared secret missing or wrong
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated but unusable payload (bad JSON, missing title)
    #[error("invalid payload: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outbound action failures
#[derive(Debug, Error)]
pub enum ActionError {
    /// Attempted outside interactive mode
    #[error("actions are disabled in safe mode")]
    Forbidden,

    #[error("unknown action '{name}'")]
    NotFound { name: String, available: Vec<String> },

    #[error("{action} returned {status}: {snippet}")]
    ExecutionFailed {
        action: String,
        status: String,
        snippet: String,
    },

    #[error("{action} timed out")]
    Timeout { action: String },
}

impl ActionError {
    /// Text shown to the owner (and fed back into the reply) for a failed action
    pub fn user_message(&self) -> String {
        match self {
            Self::Forbidden => "🚫 Actions are disabled when reading inbox content.".to_string(),
            Self::NotFound { name, available } => {
                let available = if available.is_empty() {
                    "(none configured)".to_string()
                } else {
                    available.join(", ")
                };
                format!("❌ Unknown action '{}'.\nAvailable: {}", name, available)
            }
            Self::ExecutionFailed { action, status, snippet } => {
                format!("⚠️ {} returned {}: {}", action, status, snippet)
            }
            Self::Timeout { action } => format!("❌ {} failed: timed out", action),
        }
    }
}

/// Language-model capability failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call timed out")]
    Timeout,

    #[error("model unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("model returned no text")]
    EmptyResponse,
}

/// Inbox question failures
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
