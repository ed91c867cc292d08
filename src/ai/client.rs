//! Anthropic Messages API client
//!
//! Used for the deep model (`/claude`). Key and base URL come from
//! [`crate::config::AppConfig`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{transport_error, LanguageModel, ModelRequest};
use crate::error::ModelError;

/// Anthropic API URL
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// API version
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default timeout (ms)
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic client configuration
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    /// Messages endpoint (proxies supported)
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Make sure a configured base URL ends with `/v1/messages`
pub fn normalize_base_url(url: &str) -> String {
    let u = url.trim().trim_end_matches('/');
    if u.is_empty() {
        ANTHROPIC_API_URL.to_string()
    } else if u.ends_with("/v1/messages") {
        u.to_string()
    } else if u.ends_with("/v1") {
        format!("{}/messages", u)
    } else {
        format!("{}/v1/messages", u)
    }
}

/// Messages API request body
#[derive(Serialize)]
pub(crate) struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Serialize)]
pub(crate) struct Message {
    pub role: String,
    pub content: String,
}

/// Messages API response body
#[derive(Deserialize)]
pub(crate) struct MessagesResponse {
    pub content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: Option<String>,
}

/// API error response
#[derive(Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ApiError,
}

#[derive(Deserialize)]
pub(crate) struct ApiError {
    pub message: String,
}

pub(crate) fn build_request(config: &AnthropicConfig, request: &ModelRequest<'_>) -> MessagesRequest {
    let mut messages: Vec<Message> = request
        .history
        .iter()
        .map(|turn| Message {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        })
        .collect();
    messages.push(Message {
        role: "user".to_string(),
        content: request.message.to_string(),
    });

    MessagesRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system: Some(request.system.to_string()).filter(|s| !s.is_empty()),
        messages,
    }
}

/// Anthropic API client
pub struct AnthropicClient {
    client: reqwest::Client,
    pub(crate) config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!("Anthropic API key is empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    fn name(&self) -> &str {
        "Claude"
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<String, ModelError> {
        let body = build_request(&self.config, &request);

        debug!(
            model = %self.config.model,
            history = request.history.len(),
            base_url = %self.config.base_url,
            "Sending request to Anthropic API"
        );

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.config.base_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        debug!(elapsed_ms = start.elapsed().as_millis(), "API request completed");

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&text) {
                return Err(ModelError::UpstreamUnavailable(format!(
                    "API error ({}): {}",
                    status, error_resp.error.message
                )));
            }
            return Err(ModelError::UpstreamUnavailable(format!("API error ({})", status)));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::UpstreamUnavailable(format!("Failed to parse response: {}", e)))?;

        let reply = parsed
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if reply.trim().is_empty() {
            warn!("Empty response from Anthropic API");
            return Err(ModelError::EmptyResponse);
        }

        Ok(reply)
    }
}
