//! Conversation title heuristic.
//!
//! Order is fixed: strip platform suffixes from the page title; if what is
//! left is empty or generic, use the first user message; if that is empty
//! too, use a placeholder. Every result is `stem + " - " + platform name`,
//! and a stem taken from a message is cut so the whole title is at most
//! [`TITLE_MAX_CHARS`] characters.

use chatcap_core::{CanonicalMessage, Platform, Role};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// Maximum length, in characters, of a title derived from a message.
pub const TITLE_MAX_CHARS: usize = 40;

/// Stem used when neither the page nor the transcript offers one.
pub const PLACEHOLDER_STEM: &str = "Untitled Conversation";

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

static SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[-–|]\s*(?:chatgpt|openai|claude|anthropic|google gemini|gemini)\s*$")
        .unwrap()
});

/// Page titles that say nothing about the conversation (compared lowercase).
const GENERIC_TITLES: &[&str] = &[
    "new chat",
    "new conversation",
    "untitled",
    "chatgpt",
    "openai",
    "claude",
    "anthropic",
    "gemini",
    "google gemini",
    "nouvelle discussion",
    "nouveau chat",
    "neuer chat",
    "nuevo chat",
    "nueva conversación",
    "nuova chat",
    "novo chat",
    "nova conversa",
    "новый чат",
    "新しいチャット",
    "新对话",
    "新聊天",
    "새 채팅",
];

/// Remove trailing ` - ChatGPT`-style suffixes, repeatedly.
pub fn strip_platform_suffix(title: &str) -> String {
    let mut current = title.trim().to_string();
    loop {
        let stripped = SUFFIX_RE.replace(&current, "").trim().to_string();
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Text of the document's first `<title>`, whitespace collapsed.
pub fn document_title(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn is_generic(stem: &str) -> bool {
    let lower = stem.to_lowercase();
    GENERIC_TITLES.contains(&lower.as_str())
}

/// Derive a non-empty title for a captured conversation.
pub fn derive_title(page_title: &str, messages: &[CanonicalMessage], platform: Platform) -> String {
    let suffix = format!(" - {}", platform.display_name());

    let stem = strip_platform_suffix(page_title);
    if !stem.is_empty() && !is_generic(&stem) {
        return format!("{}{}", stem, suffix);
    }

    let budget = TITLE_MAX_CHARS.saturating_sub(suffix.chars().count());
    if let Some(first) = messages.iter().find(|m| m.role == Role::User) {
        let collapsed = first.content.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let truncated: String = collapsed.chars().take(budget).collect();
        let stem = truncated.trim_end();
        if !stem.is_empty() {
            return format!("{}{}", stem, suffix);
        }
    }

    format!("{}{}", PLACEHOLDER_STEM, suffix)
}
