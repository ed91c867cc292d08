//! Canonical inbox item

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Body length (in characters) kept verbatim before truncation
pub const MAX_BODY_CHARS: usize = 10_000;

/// Appended after a truncated body
pub const TRUNCATION_MARKER: &str = "\n\n[truncated]";

/// Item type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Email,
    Calendar,
    Alert,
    Task,
    Payment,
    News,
    Deploy,
    Reminder,
    Bluesky,
    Mastodon,
    Other,
}

impl ItemType {
    pub const ALL: [ItemType; 11] = [
        ItemType::Email,
        ItemType::Calendar,
        ItemType::Alert,
        ItemType::Task,
        ItemType::Payment,
        ItemType::News,
        ItemType::Deploy,
        ItemType::Reminder,
        ItemType::Bluesky,
        ItemType::Mastodon,
        ItemType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Calendar => "calendar",
            Self::Alert => "alert",
            Self::Task => "task",
            Self::Payment => "payment",
            Self::News => "news",
            Self::Deploy => "deploy",
            Self::Reminder => "reminder",
            Self::Bluesky => "bluesky",
            Self::Mastodon => "mastodon",
            Self::Other => "other",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Email => "📧",
            Self::Calendar => "📅",
            Self::Alert => "🚨",
            Self::Task => "✅",
            Self::Payment => "💰",
            Self::News => "📰",
            Self::Deploy => "🚀",
            Self::Reminder => "⏰",
            Self::Bluesky => "🦋",
            Self::Mastodon => "🐘",
            Self::Other => "📌",
        }
    }

    /// Capitalized label for headers ("Calendar", "Email")
    pub fn label(&self) -> String {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }

    /// Permissive normalization: anything unrecognized becomes `Other`
    pub fn normalize(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Other)
    }

    /// Comma-separated list of valid type names
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| format!("unknown item type: {}", s))
    }
}

/// A stored inbox item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub source: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub notify: bool,
    pub received_at: DateTime<Utc>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

/// An item that has passed normalization but has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub item_type: ItemType,
    pub source: String,
    pub title: String,
    pub body: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub notify: bool,
    pub external_id: Option<String>,
}

impl NewItem {
    /// Build an item; `None` when the title is blank
    pub fn new(item_type: ItemType, source: impl Into<String>, title: impl Into<String>) -> Option<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            item_type,
            source: source.into(),
            title,
            body: String::new(),
            metadata: serde_json::Map::new(),
            notify: true,
            external_id: None,
        })
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = truncate_body(body);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        self
    }
}

/// Cap a body at [`MAX_BODY_CHARS`] characters, marking the cut
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((cut, _)) => {
            let mut truncated = body[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_parse_is_case_insensitive() {
        assert_eq!("Calendar".parse::<ItemType>(), Ok(ItemType::Calendar));
        assert_eq!(" EMAIL ".parse::<ItemType>(), Ok(ItemType::Email));
        assert!("sms".parse::<ItemType>().is_err());
    }

    #[test]
    fn test_unknown_type_normalizes_to_other() {
        assert_eq!(ItemType::normalize("carrier-pigeon"), ItemType::Other);
        assert_eq!(ItemType::normalize("deploy"), ItemType::Deploy);
    }

    #[test]
    fn test_label() {
        assert_eq!(ItemType::Payment.label(), "Payment");
    }

    #[test]
    fn test_blank_title_rejected() {
        assert!(NewItem::new(ItemType::Other, "x", "   ").is_none());
        assert!(NewItem::new(ItemType::Other, "x", "").is_none());
    }

    #[test]
    fn test_truncate_body_at_cap() {
        let body = "a".repeat(15_000);
        let stored = truncate_body(&body);
        assert_eq!(stored.len(), MAX_BODY_CHARS + TRUNCATION_MARKER.len());
        assert!(stored.starts_with(&"a".repeat(MAX_BODY_CHARS)));
        assert!(stored.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_body_counts_chars_not_bytes() {
        let body = "é".repeat(MAX_BODY_CHARS);
        assert_eq!(truncate_body(&body), body);

        let longer = "é".repeat(MAX_BODY_CHARS + 1);
        let stored = truncate_body(&longer);
        assert_eq!(stored.chars().filter(|c| *c == 'é').count(), MAX_BODY_CHARS);
    }

    #[test]
    fn test_empty_external_id_is_none() {
        let item = NewItem::new(ItemType::Email, "a@b.c", "hi")
            .unwrap()
            .with_external_id(Some("  ".to_string()));
        assert!(item.external_id.is_none());
    }
}
