//! Hypersecretary - personal inbox, chat assistant and action runner
//!
//! Webhooks feed a unified SQLite inbox; the owner talks to it over Telegram.
//! Reading inbox content (safe mode) and triggering outbound actions
//! (interactive mode) are kept strictly apart.

pub mod actions;
pub mod ai;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod ingest;
pub mod notification;
pub mod query;
pub mod telegram;

pub use actions::{ActionExecutor, ActionRegistry, ActionSpec, ExecutionReport, TrustMode};
pub use ai::{AnthropicClient, ChatTurn, GeminiClient, LanguageModel, ModelRequest};
pub use config::AppConfig;
pub use conversation::{Command, ConversationRouter, PromptContext, Reply};
pub use error::{ActionError, IngestError, ModelError, QueryError, StoreError};
pub use ingest::{Channel, IngestOutcome, IngestionGateway, WebhookSecrets};
pub use notification::{
    AlertDispatcher, AlertMessage, InsertOutcome, ItemType, NewItem, NotificationItem, NotificationStore,
};
pub use query::QueryEngine;
