//! Application configuration
//!
//! Each setting is resolved in priority order:
//! 1. `~/.config/hypersecretary/config.json` (snake_case keys)
//! 2. Environment variables (`TELEGRAM_TOKEN`, `WEBHOOK_SECRET`, ...)
//! 3. Built-in defaults

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::ai::client::{normalize_base_url, ANTHROPIC_API_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_MS};
use crate::ai::gemini::DEFAULT_GEMINI_MODEL;
use crate::telegram::TELEGRAM_API_BASE;

pub const DEFAULT_WEBHOOK_PORT: u16 = 8080;

/// Shipped example secret; running with it is a misconfiguration
pub const PLACEHOLDER_SECRET: &str = "change-me-to-something-random";

/// Raw config file contents; every field optional
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub telegram_token: Option<String>,
    pub allowed_users: Option<Vec<i64>>,
    pub webhook_secret: Option<String>,
    pub email_webhook_secret: Option<String>,
    pub notify_webhook_secret: Option<String>,
    pub webhook_port: Option<u16>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub claude_model: Option<String>,
    pub google_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub model_timeout_ms: Option<u64>,
    pub data_dir: Option<PathBuf>,
    pub home_dir: Option<PathBuf>,
}

impl FileConfig {
    /// `~/.config/hypersecretary/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/hypersecretary/config.json"))
    }

    /// Missing file is not an error
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: Option<String>,
    pub telegram_api_base: String,
    pub allowed_users: Vec<i64>,
    pub webhook_secret: String,
    pub email_webhook_secret: Option<String>,
    pub notify_webhook_secret: Option<String>,
    pub webhook_port: u16,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub claude_model: String,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub model_timeout_ms: u64,
    /// Holds `inbox.db` and `inbox.lock`
    pub data_dir: PathBuf,
    /// Holds `system_prompt.md`, `context/` and `actions.json`
    pub home_dir: PathBuf,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The shipped example secret counts as unset
fn usable_secret(value: Option<String>) -> Option<String> {
    value.filter(|v| {
        if v.trim() == PLACEHOLDER_SECRET {
            warn!("Ignoring placeholder webhook secret");
            return false;
        }
        true
    })
}

/// Comma-separated Telegram user ids; bad entries are skipped
pub fn parse_user_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(value = %s, "Ignoring invalid ALLOWED_USERS entry");
                None
            }
        })
        .collect()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("hypersecretary"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn default_home_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("hypersecretary"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl AppConfig {
    /// Merge file values over environment values over defaults
    pub fn resolve<F>(file: FileConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| non_empty(env(key));

        let webhook_port = file.webhook_port.unwrap_or_else(|| {
            lookup("WEBHOOK_PORT")
                .and_then(|p| match p.trim().parse() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        warn!(value = %p, "Invalid WEBHOOK_PORT, using default");
                        None
                    }
                })
                .unwrap_or(DEFAULT_WEBHOOK_PORT)
        });

        let anthropic_base_url = non_empty(file.anthropic_base_url)
            .or_else(|| lookup("ANTHROPIC_BASE_URL"))
            .map(|u| normalize_base_url(&u))
            .unwrap_or_else(|| ANTHROPIC_API_URL.to_string());

        Self {
            telegram_token: non_empty(file.telegram_token).or_else(|| lookup("TELEGRAM_TOKEN")),
            telegram_api_base: lookup("TELEGRAM_API_BASE").unwrap_or_else(|| TELEGRAM_API_BASE.to_string()),
            allowed_users: file
                .allowed_users
                .unwrap_or_else(|| lookup("ALLOWED_USERS").map(|raw| parse_user_ids(&raw)).unwrap_or_default()),
            webhook_secret: usable_secret(non_empty(file.webhook_secret).or_else(|| lookup("WEBHOOK_SECRET")))
                .unwrap_or_default(),
            email_webhook_secret: usable_secret(
                non_empty(file.email_webhook_secret).or_else(|| lookup("EMAIL_WEBHOOK_SECRET")),
            ),
            notify_webhook_secret: usable_secret(
                non_empty(file.notify_webhook_secret).or_else(|| lookup("NOTIFY_WEBHOOK_SECRET")),
            ),
            webhook_port,
            anthropic_api_key: non_empty(file.anthropic_api_key).or_else(|| lookup("ANTHROPIC_API_KEY")),
            anthropic_base_url,
            claude_model: non_empty(file.claude_model)
                .or_else(|| lookup("CLAUDE_MODEL"))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            google_api_key: non_empty(file.google_api_key).or_else(|| lookup("GOOGLE_API_KEY")),
            gemini_model: non_empty(file.gemini_model)
                .or_else(|| lookup("GEMINI_MODEL"))
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            model_timeout_ms: file
                .model_timeout_ms
                .or_else(|| lookup("MODEL_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()))
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            data_dir: file
                .data_dir
                .or_else(|| lookup("HYPERSEC_DATA_DIR").map(PathBuf::from))
                .unwrap_or_else(default_data_dir),
            home_dir: file
                .home_dir
                .or_else(|| lookup("HYPERSEC_HOME").map(PathBuf::from))
                .unwrap_or_else(default_home_dir),
        }
    }

    /// Load from the default config file and the process environment
    pub fn auto_load() -> Result<Self> {
        let file = match FileConfig::default_path() {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(file, |key| std::env::var(key).ok()))
    }

    /// Problems worth a startup warning
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.webhook_secret.is_empty() {
            warnings.push("WEBHOOK_SECRET is not set; webhooks without their own secret reject every request".to_string());
        }
        if self.allowed_users.is_empty() {
            warnings.push("ALLOWED_USERS is empty; the bot will answer anyone and alerts go nowhere".to_string());
        }
        if self.google_api_key.is_none() && self.anthropic_api_key.is_none() {
            warnings.push("Neither GOOGLE_API_KEY nor ANTHROPIC_API_KEY is set; chat is unavailable".to_string());
        }
        warnings
    }
}
