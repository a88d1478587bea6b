//! Markup sanitizer: strips controls, icons and media from a message block.
//!
//! Works on a parsed copy of the fragment, so the live page is never touched.
//! Output is the dual `{text, markup}` representation. Sanitizing never fails
//! from the caller's point of view: any internal problem degrades the block to
//! plain text with empty markup.

use std::collections::HashSet;

use chatcap_core::MessageContent;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

/// Interactive and decorative nodes that never belong in exported content.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "button",
    "svg",
    "img",
    "picture",
    "video",
    "audio",
    "canvas",
    "input",
    "textarea",
    "select",
    "form",
    "script",
    "style",
    "noscript",
    "[role=\"button\"]",
    "[data-testid*=\"copy\"]",
    "[data-testid*=\"edit\"]",
    "[aria-label*=\"Copy\"]",
    "[aria-label*=\"Edit\"]",
    ".sr-only",
];

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Error)]
enum SanitizeError {
    #[error("invalid denylist selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Removes denylisted nodes from message fragments.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    selectors: Vec<Selector>,
    /// First denylist entry that failed to compile, with the parser's reason.
    invalid: Option<(String, String)>,
}

impl Sanitizer {
    /// Sanitizer with the built-in denylist.
    pub fn new() -> Self {
        Self::with_extra(&[])
    }

    /// Sanitizer with the built-in denylist plus `extra` selectors.
    ///
    /// An entry that does not compile puts the sanitizer in plain-text mode:
    /// every block falls back to text with empty markup, so markup can never
    /// carry nodes the denylist was meant to remove.
    pub fn with_extra(extra: &[String]) -> Self {
        let mut selectors = Vec::with_capacity(DEFAULT_DENYLIST.len() + extra.len());
        let mut invalid = None;

        let entries = DEFAULT_DENYLIST
            .iter()
            .map(|s| s.to_string())
            .chain(extra.iter().cloned());
        for entry in entries {
            match Selector::parse(&entry) {
                Ok(selector) => selectors.push(selector),
                Err(e) => {
                    warn!("Denylist selector {:?} does not compile: {:?}", entry, e);
                    if invalid.is_none() {
                        invalid = Some((entry.clone(), format!("{:?}", e)));
                    }
                }
            }
        }

        Self { selectors, invalid }
    }

    /// Clean one fragment. Never fails; see the module docs.
    pub fn sanitize(&self, fragment: &str) -> MessageContent {
        match self.try_sanitize(fragment) {
            Ok(content) => content,
            Err(e) => {
                warn!("Sanitization fallback to plain text: {}", e);
                MessageContent::plain(plain_text(fragment))
            }
        }
    }

    fn try_sanitize(&self, fragment: &str) -> Result<MessageContent, SanitizeError> {
        if let Some((selector, reason)) = &self.invalid {
            return Err(SanitizeError::InvalidSelector {
                selector: selector.clone(),
                reason: reason.clone(),
            });
        }

        let mut doc = Html::parse_fragment(fragment);
        let doomed: HashSet<_> = self
            .selectors
            .iter()
            .flat_map(|selector| doc.select(selector).map(|el| el.id()).collect::<Vec<_>>())
            .collect();

        if doomed.is_empty() {
            let text = doc.root_element().text().collect::<String>();
            return Ok(MessageContent {
                text: text.trim().to_string(),
                markup: fragment.trim().to_string(),
            });
        }

        debug!("Removing {} non-content nodes", doomed.len());
        for id in doomed {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }

        let root = doc.root_element();
        let text = root.text().collect::<String>();
        Ok(MessageContent {
            text: text.trim().to_string(),
            markup: root.inner_html().trim().to_string(),
        })
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort text from raw markup without a parser: drop tags, decode the
/// common entities, collapse whitespace.
pub fn plain_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}
