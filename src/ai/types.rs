//! Shared model types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One remembered turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a model needs for one completion
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system: &'a str,
    pub history: &'a [ChatTurn],
    pub message: &'a str,
}

impl<'a> ModelRequest<'a> {
    /// Single-shot request with no history
    pub fn new(system: &'a str, message: &'a str) -> Self {
        Self {
            system,
            history: &[],
            message,
        }
    }

    pub fn with_history(mut self, history: &'a [ChatTurn]) -> Self {
        self.history = history;
        self
    }
}

/// A hosted language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Display name, e.g. "Claude"
    fn name(&self) -> &str;

    /// Provider model identifier
    fn model_id(&self) -> &str;

    async fn complete(&self, request: ModelRequest<'_>) -> Result<String, ModelError>;
}

/// Map a transport error onto the model error taxonomy
pub(crate) fn transport_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::UpstreamUnavailable(e.to_string())
    }
}
