//! Channel payloads and their normalization into [`NewItem`]

use serde::Deserialize;

use crate::error::IngestError;
use crate::notification::{ItemType, NewItem};

/// Email worker payload
#[derive(Debug, Default, Deserialize)]
pub struct EmailPayload {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// Generic notification payload; only `title` is required
#[derive(Debug, Default, Deserialize)]
pub struct NotifyPayload {
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub notify: Option<bool>,
    #[serde(default)]
    pub external_id: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_json<T: for<'de> Deserialize<'de>>(raw: &[u8]) -> Result<T, IngestError> {
    serde_json::from_slice(raw).map_err(|e| IngestError::Validation(format!("invalid JSON: {}", e)))
}

impl EmailPayload {
    pub fn into_item(self) -> Result<NewItem, IngestError> {
        let source = non_blank(self.from).unwrap_or_else(|| "unknown".to_string());
        let title = non_blank(self.subject).unwrap_or_else(|| "(no subject)".to_string());

        let mut metadata = serde_json::Map::new();
        for (key, value) in [("to", &self.to), ("message_id", &self.message_id), ("date", &self.date)] {
            if let Some(v) = value {
                metadata.insert(key.to_string(), serde_json::Value::String(v.clone()));
            }
        }

        let item = NewItem::new(ItemType::Email, source, title)
            .ok_or_else(|| IngestError::Validation("missing subject".to_string()))?;
        Ok(item
            .with_body(self.body.as_deref().unwrap_or_default())
            .with_metadata(metadata)
            .with_external_id(self.message_id))
    }
}

impl NotifyPayload {
    pub fn into_item(self) -> Result<NewItem, IngestError> {
        let title = non_blank(self.title)
            .ok_or_else(|| IngestError::Validation("missing required field: title".to_string()))?;
        let item_type = self
            .item_type
            .as_deref()
            .map(ItemType::normalize)
            .unwrap_or(ItemType::Other);
        let source = non_blank(self.source).unwrap_or_else(|| "webhook".to_string());

        let item = NewItem::new(item_type, source, title)
            .ok_or_else(|| IngestError::Validation("missing required field: title".to_string()))?;
        Ok(item
            .with_body(self.body.as_deref().unwrap_or_default())
            .with_metadata(self.metadata.unwrap_or_default())
            .with_notify(self.notify.unwrap_or(true))
            .with_external_id(self.external_id))
    }
}
