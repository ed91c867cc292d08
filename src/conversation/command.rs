//! Command parsing for the conversational surface

use crate::actions::TrustMode;

/// Which model answers a free-text turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    /// Default, cheap
    Fast,
    /// `/claude`
    Deep,
}

/// One parsed owner message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/inbox [type]`; the raw type is validated by the router
    ListInbox(Option<String>),
    Search(String),
    Ask(String),
    Do { action: String, args: String },
    Chat { model: ModelChoice, text: String },
    ListActions,
    ResetHistory,
    Status,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse a message; anything not starting with `/` is free text
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let Some(stripped) = text.strip_prefix('/') else {
            return Self::Chat {
                model: ModelChoice::Fast,
                text: text.to_string(),
            };
        };

        let (head, rest) = match stripped.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (stripped, ""),
        };
        // Group chats address commands as /inbox@botname
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        match name.as_str() {
            "inbox" | "list-inbox" => {
                Self::ListInbox(Some(rest.to_lowercase()).filter(|t| !t.is_empty()))
            }
            "search" => Self::Search(rest.to_string()),
            "ask" => Self::Ask(rest.to_string()),
            "do" => {
                let (action, args) = match rest.split_once(char::is_whitespace) {
                    Some((a, b)) => (a, b.trim()),
                    None => (rest, ""),
                };
                Self::Do {
                    action: action.to_lowercase(),
                    args: args.to_string(),
                }
            }
            "claude" => Self::Chat {
                model: ModelChoice::Deep,
                text: rest.to_string(),
            },
            "flash" => Self::Chat {
                model: ModelChoice::Fast,
                text: rest.to_string(),
            },
            "actions" | "list-actions" => Self::ListActions,
            "clear" | "reset-history" => Self::ResetHistory,
            "status" => Self::Status,
            "help" | "start" => Self::Help,
            _ => Self::Unknown(name),
        }
    }

    /// Trust mode is a property of the command kind alone
    pub fn trust_mode(&self) -> TrustMode {
        match self {
            Self::Do { .. } | Self::Chat { .. } => TrustMode::Interactive,
            _ => TrustMode::Safe,
        }
    }
}
