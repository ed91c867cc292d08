//! System prompt assembly from `system_prompt.md` and `context/*.md`

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.md";
pub const CONTEXT_DIR: &str = "context";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful personal assistant.";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Base system prompt, loaded once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    base: String,
    context_files: usize,
}

/// `daily_routine` -> `Daily Routine`
fn section_title(stem: &str) -> String {
    stem.split(|c| c == '_' || c == ' ')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl PromptContext {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            context_files: 0,
        }
    }

    /// Load from a home directory holding `system_prompt.md` and `context/`
    pub fn load(home: &Path) -> Self {
        let mut parts = Vec::new();

        let prompt_file = home.join(SYSTEM_PROMPT_FILE);
        match fs::read_to_string(&prompt_file) {
            Ok(content) => parts.push(content.trim().to_string()),
            Err(e) if prompt_file.exists() => {
                warn!(path = %prompt_file.display(), error = %e, "Cannot read system prompt")
            }
            Err(_) => {}
        }

        let mut files: Vec<PathBuf> = fs::read_dir(home.join(CONTEXT_DIR))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
                    .collect()
            })
            .unwrap_or_default();
        files.sort();

        let mut context_files = 0;
        for path in &files {
            let Ok(content) = fs::read_to_string(path) else {
                warn!(path = %path.display(), "Skipping unreadable context file");
                continue;
            };
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            parts.push(format!("## {}\n\n{}", section_title(stem), content.trim()));
            context_files += 1;
        }

        debug!(context_files, "Loaded system prompt");

        let base = if parts.is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            parts.join(SECTION_SEPARATOR)
        };
        Self { base, context_files }
    }

    /// Prompt for safe-mode calls
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn context_files(&self) -> usize {
        self.context_files
    }

    /// Prompt for interactive calls: base plus the action catalog section
    pub fn with_actions(&self, catalog: &str) -> String {
        format!("{}{}", self.base, catalog)
    }
}

impl Default for PromptContext {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_when_nothing_present() {
        let dir = TempDir::new().unwrap();
        let prompt = PromptContext::load(dir.path());
        assert_eq!(prompt.base(), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(prompt.context_files(), 0);
    }

    #[test]
    fn test_prompt_and_context_sections() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SYSTEM_PROMPT_FILE), "You are my secretary.\n").unwrap();
        fs::create_dir(dir.path().join(CONTEXT_DIR)).unwrap();
        fs::write(dir.path().join("context/daily_routine.md"), "Up at 7.").unwrap();
        fs::write(dir.path().join("context/about_me.md"), "I live in Singapore.").unwrap();
        fs::write(dir.path().join("context/notes.txt"), "ignored").unwrap();

        let prompt = PromptContext::load(dir.path());
        assert_eq!(prompt.context_files(), 2);
        assert_eq!(
            prompt.base(),
            "You are my secretary.\n\n---\n\n## About Me\n\nI live in Singapore.\n\n---\n\n## Daily Routine\n\nUp at 7."
        );
    }

    #[test]
    fn test_with_actions_appends_catalog() {
        let prompt = PromptContext::new("base");
        assert_eq!(prompt.with_actions(""), "base");
        assert_eq!(prompt.with_actions("\n\ncatalog"), "base\n\ncatalog");
    }
}
