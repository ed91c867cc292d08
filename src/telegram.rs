//! Telegram Bot API front end: long polling, owner filtering and replies

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationRouter, Reply};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Long-poll wait passed to getUpdates
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// Thin async Bot API client
#[derive(Debug, Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramApi {
    /// `api_base` is normally [`TELEGRAM_API_BASE`]; `TELEGRAM_API_BASE` env overrides it
    pub fn new(token: &str, api_base: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(anyhow!("Telegram token is empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, method: &str, payload: serde_json::Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        let response: ApiResponse<T> = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Telegram {} request failed", method))?
            .json()
            .await
            .with_context(|| format!("Telegram {} returned invalid JSON", method))?;

        if !response.ok {
            return Err(anyhow!(
                "Telegram {} failed: {}",
                method,
                response.description.unwrap_or_default()
            ));
        }
        response
            .result
            .ok_or_else(|| anyhow!("Telegram {} returned no result", method))
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call("sendMessage", serde_json::json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    /// Send a reply, split into chunks if needed
    pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        for chunk in reply.chunks() {
            self.send_message(chat_id, &chunk).await?;
        }
        Ok(())
    }

    pub async fn send_typing(&self, chat_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .call("sendChatAction", serde_json::json!({ "chat_id": chat_id, "action": "typing" }))
            .await?;
        Ok(())
    }

    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }
}

/// Owner filter; an empty list admits everyone
#[derive(Debug, Clone, Default)]
pub struct AllowedUsers(Vec<i64>);

impl AllowedUsers {
    pub fn new(ids: Vec<i64>) -> Self {
        Self(ids)
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.0.is_empty() || self.0.contains(&user_id)
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }
}

/// Long-polling loop feeding owner messages to the router
pub struct TelegramBot {
    api: TelegramApi,
    router: Arc<ConversationRouter>,
    allowed: AllowedUsers,
}

impl TelegramBot {
    pub fn new(api: TelegramApi, router: Arc<ConversationRouter>, allowed: AllowedUsers) -> Self {
        Self { api, router, allowed }
    }

    /// Poll forever
    pub async fn run(self) -> Result<()> {
        info!(owners = self.allowed.ids().len(), "Telegram polling started");
        let bot = Arc::new(self);
        let mut offset = 0;

        loop {
            let updates = match bot.api.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(message) = update.message else { continue };
                // Each message gets its own task so a slow model call does not stall polling
                let bot = Arc::clone(&bot);
                tokio::spawn(async move { bot.handle_message(message).await });
            }
        }
    }

    async fn handle_message(&self, message: Message) {
        let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        let Some(user_id) = message.from.as_ref().map(|u| u.id) else {
            return;
        };
        if !self.allowed.is_allowed(user_id) {
            debug!(user_id, "Ignoring message from non-owner");
            return;
        }

        let chat_id = message.chat.id;
        let preview: String = text.chars().take(80).collect();
        info!(user_id, text = %preview, "Owner message");

        if let Err(e) = self.api.send_typing(chat_id).await {
            debug!(error = %e, "sendChatAction failed");
        }
        let reply = self.router.handle(user_id, text).await;
        if let Err(e) = self.api.send_reply(chat_id, &reply).await {
            warn!(chat_id, error = %e, "Failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_users() {
        assert!(AllowedUsers::default().is_allowed(42));
        let owners = AllowedUsers::new(vec![1, 2]);
        assert!(owners.is_allowed(2));
        assert!(!owners.is_allowed(3));
    }

    #[test]
    fn test_update_parsing_ignores_unknown_fields() {
        let json = r#"{"ok":true,"result":[{"update_id":5,"message":{"message_id":1,
            "chat":{"id":-100,"type":"private"},"from":{"id":7,"is_bot":false},"text":"/inbox"}},
            {"update_id":6,"edited_message":{}}]}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        let updates = parsed.result.unwrap();
        assert_eq!(updates.len(), 2);
        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(msg.chat.id, -100);
        assert_eq!(msg.from.as_ref().unwrap().id, 7);
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_error_response_without_result() {
        let json = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(!parsed.ok);
        assert!(parsed.result.is_none());
        assert_eq!(parsed.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_api_requires_token() {
        assert!(TelegramApi::new("", TELEGRAM_API_BASE).is_err());
    }
}
