//! Action executor - turns a validated action request into one outbound call

use anyhow::{anyhow, Result};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::registry::{ActionRegistry, ActionSpec};
use crate::error::ActionError;

/// Outbound call timeout
pub const ACTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest error body echoed back to the owner
pub const MAX_SNIPPET_CHARS: usize = 200;

/// Whether the current request may cause side effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustMode {
    /// Owner instructions; actions allowed
    Interactive,
    /// Inbox content is in play; actions forbidden
    Safe,
}

/// Fully rendered HTTP request for an action
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: serde_json::Map<String, serde_json::Value>,
}

/// Result of a successful action
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub action: String,
    pub status: u16,
    pub confirmation: String,
}

/// Split argument text over the declared fields
///
/// Whitespace separates values; the last field takes the rest of the text
/// verbatim. Missing trailing values are omitted. No fields means the text is
/// ignored.
pub fn bind_fields(fields: &[String], args: &str) -> Vec<(String, String)> {
    let mut bound = Vec::new();
    let mut rest = args.trim();

    for (i, field) in fields.iter().enumerate() {
        if rest.is_empty() {
            break;
        }
        if i + 1 == fields.len() {
            bound.push((field.clone(), rest.to_string()));
            break;
        }
        match rest.split_once(char::is_whitespace) {
            Some((head, tail)) => {
                bound.push((field.clone(), head.to_string()));
                rest = tail.trim_start();
            }
            None => {
                bound.push((field.clone(), rest.to_string()));
                rest = "";
            }
        }
    }

    bound
}

/// Build the request an action would send, without sending it
pub fn render_request(spec: &ActionSpec, args: &str) -> RenderedRequest {
    let mut body = spec.body_template.clone();
    for (field, value) in bind_fields(&spec.fields, args) {
        body.insert(field, serde_json::Value::String(value));
    }

    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    for (k, v) in &spec.headers {
        headers.insert(k.clone(), v.clone());
    }

    RenderedRequest {
        method: spec.method.trim().to_uppercase(),
        url: spec.url.clone(),
        headers,
        body,
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(MAX_SNIPPET_CHARS).collect()
}

/// Executes catalog actions over HTTP
pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
    client: Client,
}

impl ActionExecutor {
    pub fn new(registry: Arc<ActionRegistry>) -> Result<Self> {
        Self::with_timeout(registry, ACTION_TIMEOUT)
    }

    pub fn with_timeout(registry: Arc<ActionRegistry>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { registry, client })
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Run one action
    ///
    /// The trust check happens before the catalog is consulted, so a safe-mode
    /// caller learns nothing about which actions exist.
    pub async fn execute(
        &self,
        name: &str,
        args: &str,
        mode: TrustMode,
    ) -> Result<ExecutionReport, ActionError> {
        if mode != TrustMode::Interactive {
            warn!(action = %name, "Blocked action outside interactive mode");
            return Err(ActionError::Forbidden);
        }

        let name = name.trim().to_lowercase();
        let spec = self.registry.get(&name).ok_or_else(|| ActionError::NotFound {
            name: name.clone(),
            available: self.registry.names(),
        })?;

        let rendered = render_request(spec, args);
        let method = Method::from_bytes(rendered.method.as_bytes()).map_err(|_| {
            ActionError::ExecutionFailed {
                action: name.clone(),
                status: "config".to_string(),
                snippet: format!("invalid method {}", rendered.method),
            }
        })?;

        let mut request = self.client.request(method.clone(), &rendered.url);
        for (k, v) in &rendered.headers {
            request = request.header(k.as_str(), v.as_str());
        }
        request = if method == Method::GET {
            let query: Vec<(String, String)> = rendered
                .body
                .iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => (k.clone(), s.clone()),
                    other => (k.clone(), other.to_string()),
                })
                .collect();
            request.query(&query)
        } else {
            request.json(&rendered.body)
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(action = %name, "Action timed out");
                ActionError::Timeout { action: name.clone() }
            } else {
                warn!(action = %name, error = %e, "Action request failed");
                ActionError::ExecutionFailed {
                    action: name.clone(),
                    status: "error".to_string(),
                    snippet: snippet(&e.to_string()),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(action = %name, status = status.as_u16(), "Action returned error status");
            return Err(ActionError::ExecutionFailed {
                action: name,
                status: status.as_u16().to_string(),
                snippet: snippet(&body),
            });
        }

        info!(action = %name, status = status.as_u16(), "Action executed");
        let label = spec.description.clone().unwrap_or_else(|| name.clone());
        Ok(ExecutionReport {
            action: name,
            status: status.as_u16(),
            confirmation: format!("✅ {} — done", label),
        })
    }

    /// Execute and flatten to the text shown to the owner
    pub async fn execute_to_text(&self, name: &str, args: &str, mode: TrustMode) -> String {
        match self.execute(name, args, mode).await {
            Ok(report) => report.confirmation,
            Err(e) => e.user_message(),
        }
    }
}
