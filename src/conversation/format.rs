//! Text rendering for chat replies

use chrono::{DateTime, Utc};

use crate::notification::NotificationItem;

/// Telegram hard limit per message
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Chunk size used when a reply has to be split
pub const CHUNK_CHARS: usize = 4000;

const SNIPPET_CHARS: usize = 120;

pub fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%d %b %H:%M").to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Local part of an email address, or the whole source, capped at 20 chars
pub fn short_source(source: &str) -> String {
    let local = source.split('@').next().unwrap_or(source);
    truncate_chars(local, 20)
}

/// Two-line listing entry: unread marker, icon, date and source, then title
pub fn format_item_line(item: &NotificationItem) -> String {
    let marker = if item.read { " " } else { "🔵" };
    format!(
        "{}{} {} | {}\n   {}",
        marker,
        item.item_type.icon(),
        format_date(&item.received_at),
        short_source(&item.source),
        truncate_chars(&item.title, 50)
    )
}

/// First line-flattened characters of the body, if any
pub fn body_snippet(item: &NotificationItem) -> Option<String> {
    let snippet = truncate_chars(&item.body, SNIPPET_CHARS).replace('\n', " ");
    if snippet.trim().is_empty() {
        None
    } else {
        Some(snippet)
    }
}

/// Split a prefixed reply into sendable messages
///
/// The prefix is applied to the first chunk only.
pub fn chunk_reply(prefix: &str, text: &str) -> Vec<String> {
    let full_len = prefix.chars().count() + text.chars().count();
    if full_len <= MAX_MESSAGE_CHARS {
        return vec![format!("{}{}", prefix, text)];
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(CHUNK_CHARS)
        .enumerate()
        .map(|(i, chunk)| {
            let body: String = chunk.iter().collect();
            if i == 0 {
                format!("{}{}", prefix, body)
            } else {
                body
            }
        })
        .collect()
}
