//! Owner alert channel trait

use anyhow::Result;
use async_trait::async_trait;

use super::item::{ItemType, NotificationItem};

/// Alert delivered to the owner
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    /// Formatted text
    pub content: String,
    /// Throttle key, `type:source`
    pub throttle_key: String,
}

impl AlertMessage {
    pub fn new(content: impl Into<String>, throttle_key: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            throttle_key: throttle_key.into(),
        }
    }

    /// Alert for a freshly stored item
    pub fn for_item(item: &NotificationItem) -> Self {
        let content = match item.item_type {
            ItemType::Email => format!(
                "{} New email\nFrom: {}\nSubject: {}",
                item.item_type.icon(),
                item.source,
                item.title
            ),
            other => format!(
                "{} {}\nFrom: {}\n{}",
                other.icon(),
                other.label(),
                item.source,
                item.title
            ),
        };
        Self::new(content, format!("{}:{}", item.item_type, item.source))
    }
}

/// Send result
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Sent,
    /// Channel chose not to deliver
    Skipped(String),
    Failed(String),
}

/// Somewhere owner alerts can be delivered
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Channel name (for logs)
    fn name(&self) -> &str;

    async fn send(&self, message: &AlertMessage) -> Result<SendResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(item_type: ItemType, source: &str, title: &str) -> NotificationItem {
        NotificationItem {
            id: 1,
            item_type,
            source: source.to_string(),
            title: title.to_string(),
            body: String::new(),
            metadata: serde_json::Map::new(),
            notify: true,
            received_at: Utc::now(),
            read: false,
            external_id: None,
        }
    }

    #[test]
    fn test_email_alert_format() {
        let alert = AlertMessage::for_item(&stored(ItemType::Email, "a@b.c", "Reservation"));
        assert_eq!(alert.content, "📧 New email\nFrom: a@b.c\nSubject: Reservation");
        assert_eq!(alert.throttle_key, "email:a@b.c");
    }

    #[test]
    fn test_generic_alert_format() {
        let alert = AlertMessage::for_item(&stored(ItemType::Deploy, "github", "v1.2 live"));
        assert_eq!(alert.content, "🚀 Deploy\nFrom: github\nv1.2 live");
    }
}
