//! `hypersec inbox | search | status | actions` - local inspection commands
//!
//! These read the store directly (WAL allows it next to a running server) and
//! never mark items read.

use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::output::{format_output, item_lines};
use crate::actions::{ActionRegistry, ACTIONS_FILE};
use crate::config::AppConfig;
use crate::notification::{ItemType, NotificationStore};

#[derive(Args, Debug)]
pub struct InboxArgs {
    /// Only this type (email, calendar, alert, ...)
    pub item_type: Option<String>,
    /// Maximum items
    #[arg(long, short, default_value = "10")]
    pub limit: usize,
    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub keyword: String,
    #[arg(long, short, default_value = "10")]
    pub limit: usize,
    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct JsonArgs {
    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub data_dir: PathBuf,
    pub total: u64,
    pub unread: u64,
    pub by_type: Vec<TypeStatus>,
    pub actions: usize,
}

#[derive(Debug, Serialize)]
pub struct TypeStatus {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub total: u64,
    pub unread: u64,
}

#[derive(Debug, Serialize)]
pub struct ActionOutput {
    pub name: String,
    pub description: String,
    pub method: String,
    pub fields: Vec<String>,
}

fn open_store(config: &AppConfig) -> Result<NotificationStore> {
    Ok(NotificationStore::open(&config.data_dir)?)
}

pub fn handle_inbox(config: &AppConfig, args: InboxArgs) -> Result<String> {
    let filter = args
        .item_type
        .as_deref()
        .map(|raw| {
            raw.parse::<ItemType>()
                .map_err(|_| anyhow!("Unknown type '{}'. Available: {}", raw, ItemType::names()))
        })
        .transpose()?;
    let items = open_store(config)?.recent(filter, args.limit)?;
    Ok(format_output(&items, args.json, |items| item_lines(items)))
}

pub fn handle_search(config: &AppConfig, args: SearchArgs) -> Result<String> {
    let items = open_store(config)?.search(&args.keyword, args.limit)?;
    Ok(format_output(&items, args.json, |items| item_lines(items)))
}

pub fn handle_status(config: &AppConfig, args: JsonArgs) -> Result<String> {
    let counts = open_store(config)?.counts()?;
    let registry = ActionRegistry::load(&config.home_dir.join(ACTIONS_FILE));

    let output = StatusOutput {
        data_dir: config.data_dir.clone(),
        total: counts.values().map(|c| c.total).sum(),
        unread: counts.values().map(|c| c.unread).sum(),
        by_type: counts
            .iter()
            .map(|(t, c)| TypeStatus {
                item_type: *t,
                total: c.total,
                unread: c.unread,
            })
            .collect(),
        actions: registry.len(),
    };

    Ok(format_output(&output, args.json, |s| {
        let mut lines = vec![
            format!("Data: {}", s.data_dir.display()),
            format!("Inbox: {} total, {} unread", s.total, s.unread),
        ];
        for t in &s.by_type {
            lines.push(format!("  {} {}: {} total, {} unread", t.item_type.icon(), t.item_type, t.total, t.unread));
        }
        lines.push(format!("Actions: {}", s.actions));
        lines.join("\n")
    }))
}

pub fn handle_actions(config: &AppConfig, args: JsonArgs) -> Result<String> {
    let registry = ActionRegistry::load(&config.home_dir.join(ACTIONS_FILE));
    let actions: Vec<ActionOutput> = registry
        .iter()
        .map(|(name, spec)| ActionOutput {
            name: name.clone(),
            description: spec.description.clone().unwrap_or_default(),
            method: spec.method.clone(),
            fields: spec.fields.clone(),
        })
        .collect();
    Ok(format_output(&actions, args.json, |_| registry.describe()))
}
