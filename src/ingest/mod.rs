//! Ingestion gateway - authenticates, normalizes and stores inbound events

pub mod http;
pub mod payload;

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::notification::{
    AlertDispatcher, AlertMessage, InsertOutcome, NewItem, NotificationItem, NotificationStore,
};
use payload::{parse_json, EmailPayload, NotifyPayload};

pub use http::{create_router, serve};

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "X-Webhook-Secret";

/// Inbound channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Notify,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Notify => "notify",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-channel shared secrets
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    email: String,
    notify: String,
}

impl WebhookSecrets {
    /// One secret for every channel
    pub fn shared(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            email: secret.clone(),
            notify: secret,
        }
    }

    pub fn with_email(mut self, secret: impl Into<String>) -> Self {
        self.email = secret.into();
        self
    }

    pub fn with_notify(mut self, secret: impl Into<String>) -> Self {
        self.notify = secret.into();
        self
    }

    fn for_channel(&self, channel: Channel) -> &str {
        match channel {
            Channel::Email => &self.email,
            Channel::Notify => &self.notify,
        }
    }

    /// An unset secret admits nobody
    pub fn verify(&self, channel: Channel, presented: Option<&str>) -> bool {
        let expected = self.for_channel(channel);
        match presented {
            Some(presented) if !expected.is_empty() => constant_time_compare(expected, presented),
            _ => false,
        }
    }
}

impl fmt::Debug for WebhookSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSecrets")
            .field("email", &"***")
            .field("notify", &"***")
            .finish()
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Successful ingestion
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Stored(NotificationItem),
    /// Already stored under this id; reported as success
    Duplicate(i64),
}

pub struct IngestionGateway {
    store: Arc<NotificationStore>,
    dispatcher: Arc<AlertDispatcher>,
    secrets: WebhookSecrets,
}

impl IngestionGateway {
    pub fn new(store: Arc<NotificationStore>, dispatcher: Arc<AlertDispatcher>, secrets: WebhookSecrets) -> Self {
        Self {
            store,
            dispatcher,
            secrets,
        }
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    /// Authenticate, normalize and store one raw event
    ///
    /// Alert delivery happens on a detached task; this returns as soon as the
    /// item is stored.
    pub fn ingest(
        &self,
        channel: Channel,
        credential: Option<&str>,
        raw: &[u8],
    ) -> Result<IngestOutcome, IngestError> {
        if !self.secrets.verify(channel, credential) {
            warn!(channel = %channel, "Rejected webhook with bad or missing secret");
            return Err(IngestError::Unauthorized);
        }

        let item = normalize(channel, raw).map_err(|e| {
            warn!(channel = %channel, error = %e, "Rejected invalid payload");
            e
        })?;

        match self.store.insert(&item)? {
            InsertOutcome::Inserted(stored) => {
                info!(
                    channel = %channel,
                    id = stored.id,
                    item_type = %stored.item_type,
                    source = %stored.source,
                    "Stored inbox item"
                );
                if stored.notify {
                    self.dispatcher.dispatch(AlertMessage::for_item(&stored));
                } else {
                    debug!(id = stored.id, "Item stored silently");
                }
                Ok(IngestOutcome::Stored(stored))
            }
            InsertOutcome::Duplicate(id) => {
                info!(channel = %channel, id, "Duplicate event ignored");
                Ok(IngestOutcome::Duplicate(id))
            }
        }
    }
}

/// Channel payload to canonical item
pub fn normalize(channel: Channel, raw: &[u8]) -> Result<NewItem, IngestError> {
    match channel {
        Channel::Email => parse_json::<EmailPayload>(raw)?.into_item(),
        Channel::Notify => parse_json::<NotifyPayload>(raw)?.into_item(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{AlertChannel, SendResult};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct MockChannel {
        tx: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl AlertChannel for MockChannel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send(&self, message: &AlertMessage) -> anyhow::Result<SendResult> {
            let _ = self.tx.send(message.content.clone());
            Ok(SendResult::Sent)
        }
    }

    fn alerting_gateway(dir: &TempDir) -> (IngestionGateway, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut dispatcher = AlertDispatcher::new();
        dispatcher.register_channel(Arc::new(MockChannel { tx }));
        let store = Arc::new(NotificationStore::open(dir.path()).unwrap());
        (
            IngestionGateway::new(store, Arc::new(dispatcher), WebhookSecrets::shared("s3cret")),
            rx,
        )
    }

    async fn no_more_alerts(rx: &mut mpsc::UnboundedReceiver<String>) {
        assert!(tokio::time::timeout(Duration::from_millis(150), rx.recv()).await.is_err());
    }

    fn gateway(dir: &TempDir) -> IngestionGateway {
        let store = Arc::new(NotificationStore::open(dir.path()).unwrap());
        IngestionGateway::new(store, Arc::new(AlertDispatcher::new()), WebhookSecrets::shared("s3cret"))
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_empty_secret_admits_nobody() {
        let secrets = WebhookSecrets::shared("");
        assert!(!secrets.verify(Channel::Notify, Some("")));
        assert!(!secrets.verify(Channel::Notify, None));
    }

    #[test]
    fn test_per_channel_override() {
        let secrets = WebhookSecrets::shared("a").with_email("b");
        assert!(secrets.verify(Channel::Email, Some("b")));
        assert!(!secrets.verify(Channel::Email, Some("a")));
        assert!(secrets.verify(Channel::Notify, Some("a")));
    }

    #[test]
    fn test_debug_hides_secrets() {
        assert!(!format!("{:?}", WebhookSecrets::shared("hunter2")).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_unauthorized_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let gw = gateway(&dir);
        let err = gw
            .ingest(Channel::Notify, Some("wrong"), br#"{"title": "x"}"#)
            .unwrap_err();
        assert!(matches!(err, IngestError::Unauthorized));
        assert_eq!(gw.store().unread_count(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_success() {
        let dir = TempDir::new().unwrap();
        let gw = gateway(&dir);
        let raw = br#"{"from": "a@b.c", "subject": "Hi", "message_id": "m-1"}"#;

        let first = gw.ingest(Channel::Email, Some("s3cret"), raw).unwrap();
        let IngestOutcome::Stored(stored) = first else {
            panic!("expected stored");
        };
        let second = gw.ingest(Channel::Email, Some("s3cret"), raw).unwrap();
        assert_eq!(second, IngestOutcome::Duplicate(stored.id));
        assert_eq!(gw.store().unread_count(None).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stored_item_raises_one_alert() {
        let dir = TempDir::new().unwrap();
        let (gw, mut rx) = alerting_gateway(&dir);

        gw.ingest(Channel::Notify, Some("s3cret"), br#"{"type": "calendar", "source": "OpenTable", "title": "Table for 2"}"#)
            .unwrap();

        let alert = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(alert.contains("OpenTable"));
        assert!(alert.contains("Table for 2"));
        no_more_alerts(&mut rx).await;
    }

    #[tokio::test]
    async fn test_silent_item_is_stored_without_alert() {
        let dir = TempDir::new().unwrap();
        let (gw, mut rx) = alerting_gateway(&dir);

        let outcome = gw
            .ingest(Channel::Notify, Some("s3cret"), br#"{"source": "ci", "title": "nightly ok", "notify": false}"#)
            .unwrap();

        assert!(matches!(outcome, IngestOutcome::Stored(ref item) if !item.notify));
        assert_eq!(gw.store().unread_count(None).unwrap(), 1);
        no_more_alerts(&mut rx).await;
    }

    #[tokio::test]
    async fn test_redelivered_email_alerts_once() {
        let dir = TempDir::new().unwrap();
        let (gw, mut rx) = alerting_gateway(&dir);
        let raw = br#"{"from": "bank@example.com", "subject": "Payment received", "message_id": "<m-9@example.com>"}"#;

        gw.ingest(Channel::Email, Some("s3cret"), raw).unwrap();
        let alert = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(alert.contains("Payment received"));

        let again = gw.ingest(Channel::Email, Some("s3cret"), raw).unwrap();
        assert!(matches!(again, IngestOutcome::Duplicate(_)));
        no_more_alerts(&mut rx).await;
    }

    #[tokio::test]
    async fn test_invalid_payload_is_validation() {
        let dir = TempDir::new().unwrap();
        let gw = gateway(&dir);
        let err = gw.ingest(Channel::Notify, Some("s3cret"), b"[]").unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }
}
