//! Gemini generateContent client, the default fast model

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{transport_error, LanguageModel, ModelRequest, Role};
use crate::error::ModelError;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: GEMINI_API_BASE.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout_ms: super::client::DEFAULT_TIMEOUT_MS,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Serialize)]
pub(crate) struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
}

#[derive(Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Content,
}

fn text_content(role: Option<&str>, text: &str) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

pub(crate) fn build_request(config: &GeminiConfig, request: &ModelRequest<'_>) -> GenerateRequest {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            text_content(Some(role), &turn.content)
        })
        .collect();
    contents.push(text_content(Some("user"), request.message));

    GenerateRequest {
        system_instruction: Some(request.system)
            .filter(|s| !s.is_empty())
            .map(|s| text_content(None, s)),
        contents,
        generation_config: GenerationConfig {
            max_output_tokens: config.max_output_tokens,
        },
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow!("Google API key is empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<String, ModelError> {
        let body = build_request(&self.config, &request);
        debug!(model = %self.config.model, history = request.history.len(), "Sending request to Gemini API");

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_default();
            return Err(ModelError::UpstreamUnavailable(format!("API error ({}) {}", status, message).trim_end().to_string()));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::UpstreamUnavailable(format!("Failed to parse response: {}", e)))?;

        let reply = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if reply.trim().is_empty() {
            warn!("Empty response from Gemini API");
            return Err(ModelError::EmptyResponse);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::ChatTurn;

    #[test]
    fn test_endpoint() {
        let config = GeminiConfig::new("k").with_api_base("http://127.0.0.1:1/v1beta/");
        assert_eq!(
            config.endpoint(),
            "http://127.0.0.1:1/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_assistant_turns_become_model_role() {
        let history = vec![ChatTurn::user("a"), ChatTurn::assistant("b")];
        let request = ModelRequest::new("sys", "c").with_history(&history);
        let body = serde_json::to_value(build_request(&GeminiConfig::new("k"), &request)).unwrap();

        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "c");
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
    }
}
