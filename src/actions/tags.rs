//! Action tag grammar for model output
//!
//! A request is exactly `[ACTION: <name> <args>]` on one line. Anything that
//! merely resembles a tag (lowercase keyword, missing `]`, empty name) is
//! removed from the text and never executed.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// An action request found in model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub name: String,
    pub args: String,
    /// Byte range of the whole tag in the source text
    pub span: Range<usize>,
}

fn strict_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[ACTION:[ \t]*([^\s\]\[]+)(?:[ \t]+([^\]\[\n]*))?\]").expect("valid action tag regex")
    })
}

fn tag_like() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[\s*action\s*:[^\]\n]*\]?").expect("valid tag-like regex")
    })
}

/// Well-formed action requests, in order of appearance
pub fn parse_action_requests(text: &str) -> Vec<ActionRequest> {
    strict_tag()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().to_lowercase();
            let args = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("").to_string();
            Some(ActionRequest {
                name,
                args,
                span: whole.range(),
            })
        })
        .collect()
}

/// Remove every action-shaped fragment, well-formed or not
pub fn strip_action_tags(text: &str) -> String {
    tag_like().replace_all(text, "").into_owned()
}

/// Replace each request's tag with its result; leftover tag-like fragments
/// between requests are removed
///
/// `results` must be parallel to `requests`.
pub fn replace_action_tags(text: &str, requests: &[ActionRequest], results: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for (request, result) in requests.iter().zip(results) {
        out.push_str(&strip_action_tags(&text[cursor..request.span.start]));
        out.push_str(result);
        cursor = request.span.end;
    }
    out.push_str(&strip_action_tags(&text[cursor..]));
    out
}
