//! Action registry - the static catalog of outbound webhooks
//!
//! Loaded once from `actions.json` at startup. There is no mutation API: the
//! catalog a conversation sees is the one the process started with.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Catalog file name
pub const ACTIONS_FILE: &str = "actions.json";

fn default_method() -> String {
    "POST".to_string()
}

/// One configured action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    /// Named arguments; the last one absorbs the remaining text
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Static JSON merged into every request body
    #[serde(default)]
    pub body_template: serde_json::Map<String, serde_json::Value>,
}

impl ActionSpec {
    /// `<field1> <field2>` or empty
    pub fn field_usage(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("<{}>", f))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Read-only action catalog
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, ActionSpec>,
}

impl ActionRegistry {
    /// Empty catalog
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a catalog document; names are case-insensitive
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, ActionSpec> =
            serde_json::from_str(json).context("invalid action catalog")?;
        let actions = raw
            .into_iter()
            .map(|(name, spec)| (name.trim().to_lowercase(), spec))
            .collect();
        Ok(Self { actions })
    }

    /// Load from disk; a missing or unreadable file yields an empty catalog
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "No action catalog found, actions disabled");
            return Self::empty();
        }

        let loaded = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))
            .and_then(|content| Self::from_json(&content));

        match loaded {
            Ok(registry) => {
                info!(count = registry.len(), "Loaded action catalog");
                registry
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load action catalog");
                Self::empty()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    /// `(name, description)` pairs, sorted by name
    pub fn list_actions(&self) -> Vec<(String, String)> {
        self.actions
            .iter()
            .map(|(name, spec)| (name.clone(), spec.description.clone().unwrap_or_default()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ActionSpec)> {
        self.actions.iter()
    }

    /// System prompt section offering the catalog to the model
    ///
    /// Empty when no actions are configured.
    pub fn catalog_prompt(&self) -> String {
        if self.actions.is_empty() {
            return String::new();
        }

        let mut lines = vec![
            "\n\n---\n\n## Available Actions\n".to_string(),
            "You can trigger real-world actions by including action tags in your response.".to_string(),
            "Use this format: [ACTION: action_name arg1 arg2 ...]".to_string(),
            "You may include multiple actions in one response.".to_string(),
            "Write your conversational response around the tags; the tags will be replaced with results before the user sees it.\n".to_string(),
            "Actions available:\n".to_string(),
        ];

        for (name, spec) in &self.actions {
            let description = spec.description.as_deref().unwrap_or("no description");
            let usage = if spec.fields.is_empty() {
                format!("[ACTION: {}]", name)
            } else {
                format!("[ACTION: {} {}]", name, spec.field_usage())
            };
            lines.push(format!("- {}: {}", name, description));
            lines.push(format!("  Usage: {}", usage));
        }

        lines.push("\nExamples:".to_string());
        lines.push("User: \"Turn off the lights\" → [ACTION: lights_off] Done, lights are off.".to_string());
        lines.push("User: \"Post hello world to mastodon\" → [ACTION: toot hello world] Posted to Mastodon for you.".to_string());
        lines.push("\nOnly trigger actions when the user clearly intends it. Don't trigger actions for questions about actions.".to_string());
        lines.push("If an action fails, tell the user what happened.".to_string());

        lines.join("\n")
    }

    /// Listing for the `list-actions` command
    pub fn describe(&self) -> String {
        if self.actions.is_empty() {
            return "No actions configured.\n\nCreate an actions.json file with your webhook URLs.".to_string();
        }

        let mut lines = vec!["⚡ Available actions:\n".to_string()];
        for (name, spec) in &self.actions {
            lines.push(format!("  /do {} {}", name, spec.field_usage()).trim_end().to_string());
            lines.push(format!(
                "  └ {}\n",
                spec.description.as_deref().unwrap_or("no description")
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
        "Lights_Off": {"url": "https://maker.example.com/off", "description": "Turn off the lights"},
        "tweet": {
            "url": "https://hooks.example.com/tweet",
            "fields": ["status"],
            "headers": {"X-Token": "abc"},
            "body_template": {"account": "me"}
        }
    }"#;

    #[test]
    fn test_from_json_defaults() {
        let registry = ActionRegistry::from_json(CATALOG).unwrap();
        assert_eq!(registry.len(), 2);

        let off = registry.get("lights_off").unwrap();
        assert_eq!(off.method, "POST");
        assert!(off.fields.is_empty());
        assert!(off.headers.is_empty());

        let tweet = registry.get("TWEET").unwrap();
        assert_eq!(tweet.fields, vec!["status"]);
        assert_eq!(tweet.body_template["account"], serde_json::json!("me"));
    }

    #[test]
    fn test_list_actions_sorted() {
        let registry = ActionRegistry::from_json(CATALOG).unwrap();
        assert_eq!(
            registry.list_actions(),
            vec![
                ("lights_off".to_string(), "Turn off the lights".to_string()),
                ("tweet".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_catalog_prompt_lists_usage() {
        let registry = ActionRegistry::from_json(CATALOG).unwrap();
        let prompt = registry.catalog_prompt();
        assert!(prompt.contains("[ACTION: lights_off]"));
        assert!(prompt.contains("[ACTION: tweet <status>]"));
    }

    #[test]
    fn test_empty_catalog_prompt_is_empty() {
        assert!(ActionRegistry::empty().catalog_prompt().is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(ActionRegistry::load(&dir.path().join(ACTIONS_FILE)).is_empty());
    }

    #[test]
    fn test_load_invalid_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ACTIONS_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(ActionRegistry::load(&path).is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ACTIONS_FILE);
        fs::write(&path, CATALOG).unwrap();
        assert_eq!(ActionRegistry::load(&path).names(), vec!["lights_off", "tweet"]);
    }
}
