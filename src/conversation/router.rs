//! Conversation router - maps one owner message to one reply
//!
//! The trust mode of a turn is fixed by the command kind before any model or
//! store access: inbox commands are safe, `/do` and free text are interactive.

use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::command::{Command, ModelChoice};
use super::format::{body_snippet, chunk_reply, format_item_line};
use super::history::ConversationHistory;
use super::prompt::PromptContext;
use crate::actions::{parse_action_requests, replace_action_tags, ActionExecutor, TrustMode};
use crate::ai::{LanguageModel, ModelRequest};
use crate::error::{ModelError, QueryError, StoreError};
use crate::notification::{ItemType, NotificationStore};
use crate::query::QueryEngine;

/// Items shown by `/inbox` and `/search`
pub const LIST_LIMIT: usize = 10;

/// Reply to one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Model badge, e.g. "⚡ "
    pub prefix: String,
    pub text: String,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            prefix: String::new(),
            text: text.into(),
        }
    }

    pub fn prefixed(prefix: &str, text: impl Into<String>) -> Self {
        Self {
            prefix: prefix.to_string(),
            text: text.into(),
        }
    }

    /// Prefixed text split for the chat transport
    pub fn chunks(&self) -> Vec<String> {
        chunk_reply(&self.prefix, &self.text)
    }

    /// Prefixed text as one string
    pub fn full_text(&self) -> String {
        format!("{}{}", self.prefix, self.text)
    }
}

/// Reply for a chat turn overtaken by a history reset
pub const ABANDONED_TURN_REPLY: &str = "🧹 History was cleared; that turn was dropped.";

fn prefix_for(choice: ModelChoice) -> &'static str {
    match choice {
        ModelChoice::Fast => "⚡ ",
        ModelChoice::Deep => "🟠 ",
    }
}

fn unavailable(model: &str, err: &ModelError) -> String {
    format!("⚠️ {} unavailable, try again. ({})", model, err)
}

pub struct ConversationRouter {
    store: Arc<NotificationStore>,
    query: QueryEngine,
    executor: Arc<ActionExecutor>,
    fast_model: Arc<dyn LanguageModel>,
    deep_model: Option<Arc<dyn LanguageModel>>,
    prompt: Arc<PromptContext>,
    history: Mutex<ConversationHistory>,
}

impl ConversationRouter {
    pub fn new(
        store: Arc<NotificationStore>,
        executor: Arc<ActionExecutor>,
        fast_model: Arc<dyn LanguageModel>,
        prompt: Arc<PromptContext>,
    ) -> Self {
        let query = QueryEngine::new(Arc::clone(&store), Arc::clone(&fast_model), prompt.base());
        Self {
            store,
            query,
            executor,
            fast_model,
            deep_model: None,
            prompt,
            history: Mutex::new(ConversationHistory::new()),
        }
    }

    pub fn with_deep_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.deep_model = Some(model);
        self
    }

    pub fn with_history(mut self, history: ConversationHistory) -> Self {
        self.history = Mutex::new(history);
        self
    }

    /// Messages remembered for a user
    pub fn history_len(&self, user_id: i64) -> usize {
        self.history.lock().map_or(0, |h| h.len(user_id))
    }

    pub async fn handle(&self, user_id: i64, text: &str) -> Reply {
        let command = Command::parse(text);
        let mode = command.trust_mode();

        match command {
            Command::ListInbox(filter) => self.list_inbox(filter.as_deref()).await,
            Command::Search(keyword) => self.search(keyword).await,
            Command::Ask(question) => self.ask(&question).await,
            Command::Do { action, args } => self.run_action(&action, &args, mode).await,
            Command::Chat { model, text } => self.chat(user_id, model, &text, mode).await,
            Command::ListActions => Reply::plain(self.executor.registry().describe()),
            Command::ResetHistory => {
                if let Ok(mut history) = self.history.lock() {
                    history.clear(user_id);
                }
                Reply::plain("🧹 History cleared.")
            }
            Command::Status => self.status(user_id).await,
            Command::Help => Reply::plain(help_text()),
            Command::Unknown(name) => {
                Reply::plain(format!("Unknown command '/{}'. Send /help for the list.", name))
            }
        }
    }

    async fn list_inbox(&self, filter: Option<&str>) -> Reply {
        let item_type = match filter {
            None => None,
            Some(raw) => match raw.parse::<ItemType>() {
                Ok(t) => Some(t),
                Err(_) => {
                    return Reply::plain(format!(
                        "Unknown type '{}'.\nAvailable: {}",
                        raw,
                        ItemType::names()
                    ))
                }
            },
        };

        // Counts first: listing marks the shown items read
        let listed = self
            .store
            .run_blocking(move |store| {
                let counts = store.counts()?;
                let items = store.list_by_type(item_type, LIST_LIMIT)?;
                Ok::<_, StoreError>((counts, items))
            })
            .await;
        let (counts, items) = match listed {
            Ok(listed) => listed,
            Err(e) => return self.store_failure(e),
        };

        if items.is_empty() {
            let label = item_type.map(|t| format!(" {}", t)).unwrap_or_default();
            return Reply::plain(format!("📭 No{} items yet.", label));
        }

        let header = match item_type {
            Some(t) => {
                let unread = counts.get(&t).map_or(0, |c| c.unread);
                format!("{} {} ({} unread)", t.icon(), t.label(), unread)
            }
            None => {
                let summary: Vec<String> = counts
                    .iter()
                    .filter(|(_, c)| c.unread > 0)
                    .map(|(t, c)| format!("{} {}", t.icon(), c.unread))
                    .collect();
                let summary = if summary.is_empty() {
                    "all read".to_string()
                } else {
                    summary.join(" ")
                };
                format!("📬 Inbox ({})", summary)
            }
        };

        let mut lines = vec![header, String::new()];
        lines.extend(items.iter().map(format_item_line));
        Reply::plain(lines.join("\n"))
    }

    async fn search(&self, keyword: String) -> Reply {
        if keyword.is_empty() {
            return Reply::plain("Usage: /search <keyword>\n\nExample: /search OpenTable");
        }

        let needle = keyword.clone();
        let found = self
            .store
            .run_blocking(move |store| store.search(&needle, LIST_LIMIT))
            .await;
        let items = match found {
            Ok(items) => items,
            Err(e) => return self.store_failure(e),
        };
        if items.is_empty() {
            return Reply::plain(format!("Nothing found for '{}'.", keyword));
        }

        let mut lines = vec![format!("🔍 Found {} item(s) for '{}':\n", items.len(), keyword)];
        for item in &items {
            lines.push(format_item_line(item));
            if let Some(snippet) = body_snippet(item) {
                lines.push(format!("   {}...", snippet));
            }
            lines.push(String::new());
        }
        Reply::plain(lines.join("\n"))
    }

    async fn ask(&self, question: &str) -> Reply {
        if question.is_empty() {
            return Reply::plain(
                "Usage: /ask <question>\n\n\
                 Examples:\n\
                 /ask what reservations do I have this week?\n\
                 /ask summarise today's notifications\n\
                 /ask any payment confirmations recently?",
            );
        }

        match self.query.answer(question, None).await {
            Ok(answer) => Reply::prefixed("🔍 ", answer),
            Err(QueryError::Model(e)) => {
                warn!(error = %e, "Inbox question failed");
                Reply::plain(unavailable(self.fast_model.name(), &e))
            }
            Err(QueryError::Store(e)) => self.store_failure(e),
        }
    }

    async fn run_action(&self, action: &str, args: &str, mode: TrustMode) -> Reply {
        if action.is_empty() {
            let registry = self.executor.registry();
            if registry.is_empty() {
                return Reply::plain("No actions configured. Create an actions.json file.");
            }
            let mut lines = vec!["Usage: /do <action> [args]\n\nAvailable actions:".to_string()];
            for (name, spec) in registry.iter() {
                let usage = if spec.fields.is_empty() {
                    String::new()
                } else {
                    format!(" {}", spec.field_usage())
                };
                lines.push(format!("  ⚡ /do {}{}", name, usage));
                if let Some(description) = spec.description.as_deref().filter(|d| !d.is_empty()) {
                    lines.push(format!("     {}", description));
                }
            }
            return Reply::plain(lines.join("\n"));
        }

        info!(action = %action, "Explicit action request");
        Reply::plain(self.executor.execute_to_text(action, args, mode).await)
    }

    async fn chat(&self, user_id: i64, choice: ModelChoice, text: &str, mode: TrustMode) -> Reply {
        if text.is_empty() {
            let usage = match choice {
                ModelChoice::Deep => "Send /claude followed by your message.",
                ModelChoice::Fast => "Send /flash followed by your message, or just type normally.",
            };
            return Reply::plain(usage);
        }

        let model = match choice {
            ModelChoice::Fast => Arc::clone(&self.fast_model),
            ModelChoice::Deep => match &self.deep_model {
                Some(m) => Arc::clone(m),
                None => return Reply::plain("Claude is not configured. Set ANTHROPIC_API_KEY."),
            },
        };

        let (history, generation) = self
            .history
            .lock()
            .map(|h| (h.get(user_id), h.generation(user_id)))
            .unwrap_or_default();
        let system = self.prompt.with_actions(&self.executor.registry().catalog_prompt());
        info!(user_id, model = model.name(), "Chat turn");

        let raw = match model
            .complete(ModelRequest::new(&system, text).with_history(&history))
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(user_id, model = model.name(), error = %e, "Model call failed");
                return Reply::plain(unavailable(model.name(), &e));
            }
        };

        if !self.is_current(user_id, generation) {
            info!(user_id, "History reset during model call; turn dropped");
            return Reply::plain(ABANDONED_TURN_REPLY);
        }

        let requests = parse_action_requests(&raw);
        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            // A reset abandons the turn; actions already sent are not recalled
            if !self.is_current(user_id, generation) {
                info!(user_id, "History reset during turn; remaining actions skipped");
                return Reply::plain(ABANDONED_TURN_REPLY);
            }
            info!(action = %request.name, "Model requested action");
            results.push(self.executor.execute_to_text(&request.name, &request.args, mode).await);
        }
        let reply = replace_action_tags(&raw, &requests, &results);

        if let Ok(mut h) = self.history.lock() {
            if !h.record_if_current(user_id, generation, text, &reply) {
                info!(user_id, "History reset during turn; exchange not recorded");
            }
        }
        Reply::prefixed(prefix_for(choice), reply)
    }

    fn is_current(&self, user_id: i64, generation: u64) -> bool {
        self.history.lock().map_or(false, |h| h.generation(user_id) == generation)
    }

    async fn status(&self, user_id: i64) -> Reply {
        let counts = match self.store.run_blocking(|store| store.counts()).await {
            Ok(c) => c,
            Err(e) => return self.store_failure(e),
        };

        let total: u64 = counts.values().map(|c| c.total).sum();
        let unread: u64 = counts.values().map(|c| c.unread).sum();
        let lines: Vec<String> = counts
            .iter()
            .map(|(t, c)| format!("  {} {}: {} total, {} unread", t.icon(), t, c.total, c.unread))
            .collect();
        let summary = if lines.is_empty() {
            "  (empty)".to_string()
        } else {
            lines.join("\n")
        };

        let deep = self
            .deep_model
            .as_ref()
            .map_or("not configured".to_string(), |m| m.model_id().to_string());

        Reply::plain(format!(
            "🤖 Hypersecretary online\n\
             Flash: {}\n\
             Claude: {}\n\
             History: {} messages\n\
             Context files: {}\n\
             Actions: {}\n\
             Inbox: {} total, {} unread\n{}",
            self.fast_model.model_id(),
            deep,
            self.history_len(user_id),
            self.prompt.context_files(),
            self.executor.registry().len(),
            total,
            unread,
            summary
        ))
    }

    fn store_failure(&self, e: StoreError) -> Reply {
        warn!(error = %e, "Inbox store error");
        Reply::plain(format!("⚠️ Inbox unavailable: {}", e))
    }
}

pub fn help_text() -> String {
    format!(
        "📋 Hypersecretary\n\n\
         Just type → Gemini Flash ⚡\n\
         /claude <msg> → Claude 🟠\n\n\
         Inbox:\n\
         /inbox → All recent items\n\
         /inbox <type> → Filter ({})\n\
         /search <keyword> → Search inbox\n\
         /ask <question> → Ask about your inbox\n\n\
         Actions:\n\
         /do <action> [args] → Trigger an action\n\
         /actions → List available actions\n\n\
         Other:\n\
         /clear → Reset conversation history\n\
         /status → Bot info\n\
         /help → This message",
        ItemType::names()
    )
}
