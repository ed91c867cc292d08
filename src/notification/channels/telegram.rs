//! Telegram alert channel - pushes owner alerts as bot messages

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::notification::channel::{AlertChannel, AlertMessage, SendResult};
use crate::telegram::TelegramApi;

/// Sends alerts to every owner chat
pub struct TelegramChannel {
    api: TelegramApi,
    chat_ids: Vec<i64>,
}

impl TelegramChannel {
    pub fn new(api: TelegramApi, chat_ids: Vec<i64>) -> Self {
        Self { api, chat_ids }
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &AlertMessage) -> Result<SendResult> {
        if self.chat_ids.is_empty() {
            return Ok(SendResult::Skipped("no owner chats configured".to_string()));
        }

        let mut failures = Vec::new();
        for chat_id in &self.chat_ids {
            if let Err(e) = self.api.send_message(*chat_id, &message.content).await {
                failures.push(format!("{}: {}", chat_id, e));
            } else {
                debug!(chat_id, "Alert delivered");
            }
        }

        if failures.is_empty() {
            Ok(SendResult::Sent)
        } else {
            Ok(SendResult::Failed(failures.join("; ")))
        }
    }
}
