//! Conversational surface: commands, prompt context, history and routing

pub mod command;
pub mod format;
pub mod history;
pub mod prompt;
pub mod router;

pub use command::{Command, ModelChoice};
pub use history::{ConversationHistory, MAX_HISTORY};
pub use prompt::PromptContext;
pub use router::{ConversationRouter, Reply};
