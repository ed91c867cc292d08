//! Output formatting for CLI commands

use serde::Serialize;

use crate::conversation::format::format_item_line;
use crate::notification::NotificationItem;

/// JSON when `--json` is set, otherwise the given text rendering
pub fn format_output<T: Serialize>(data: &T, json: bool, text: impl FnOnce(&T) -> String) -> String {
    if json {
        serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
    } else {
        text(data)
    }
}

/// Item listing as shown in chat
pub fn item_lines(items: &[NotificationItem]) -> String {
    if items.is_empty() {
        return "📭 No items.".to_string();
    }
    items
        .iter()
        .map(|item| format!("#{} {}", item.id, format_item_line(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output() {
        let out = format_output(&vec![1, 2], true, |_| "text".to_string());
        assert!(out.contains('['));
    }

    #[test]
    fn test_text_output() {
        assert_eq!(format_output(&vec![1], false, |v| format!("{} item", v.len())), "1 item");
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(item_lines(&[]), "📭 No items.");
    }
}
