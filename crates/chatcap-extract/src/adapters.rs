//! Site adapters: per-platform strategies for finding message blocks.
//!
//! Every adapter owns an ordered list of markup conventions: the platform's
//! current markup first, then the legacy layouts it has shipped before. The
//! first convention that yields any block wins. Finding nothing is a normal
//! empty result, never an error.

mod chatgpt;
mod claude;
mod gemini;

use std::collections::HashSet;

use chatcap_core::{Platform, Role};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

pub use chatgpt::ChatGptAdapter;
pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;

/// A located message block before sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub role: Role,
    /// Inner markup of the block's content element.
    pub fragment: String,
}

/// How a convention decides who authored a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRule {
    /// Role name read from this attribute on the block element.
    Attribute(&'static str),
    /// Blocks matching this selector are user turns, every other block is an
    /// assistant turn.
    UserSelector(&'static str),
    /// Position-based: block 0 gets `first`, then roles alternate.
    ///
    /// Assumes the platform never renders two consecutive turns from the same
    /// author. That is not verified; a repeated author shifts every later role.
    Alternating { first: Role },
}

/// One markup layout a platform has used for its transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkupConvention {
    pub name: &'static str,
    /// Selector matching one element per message, in document order.
    pub blocks: &'static str,
    /// Selector for the content element inside a block. Blocks without a match
    /// contribute their whole body.
    pub content: Option<&'static str>,
    pub roles: RoleRule,
}

impl MarkupConvention {
    /// Locate blocks for this convention only.
    pub fn locate(&self, document: &Html) -> Vec<RawBlock> {
        let Some(blocks) = compile(self.blocks) else {
            return Vec::new();
        };
        let content = match self.content {
            Some(raw) => match compile(raw) {
                Some(selector) => Some(selector),
                None => return Vec::new(),
            },
            None => None,
        };
        let user = match self.roles {
            RoleRule::UserSelector(raw) => match compile(raw) {
                Some(selector) => Some(selector),
                None => return Vec::new(),
            },
            _ => None,
        };

        let mut accepted = HashSet::new();
        let mut found = Vec::new();
        let mut next_alternating = match self.roles {
            RoleRule::Alternating { first } => first,
            _ => Role::User,
        };

        for element in document.select(&blocks) {
            // A block nested inside an accepted block belongs to it.
            if element.ancestors().any(|a| accepted.contains(&a.id())) {
                continue;
            }

            let role = match self.roles {
                RoleRule::Attribute(attr) => {
                    let value = element.value().attr(attr).unwrap_or_default();
                    match Role::from_name(value) {
                        Some(role) => role,
                        None => {
                            debug!(
                                convention = self.name,
                                "Skipping block with unrecognised role {:?}", value
                            );
                            continue;
                        }
                    }
                }
                RoleRule::UserSelector(_) => match &user {
                    Some(selector) if selector.matches(&element) => Role::User,
                    _ => Role::Assistant,
                },
                RoleRule::Alternating { .. } => {
                    let role = next_alternating;
                    next_alternating = role.alternate();
                    role
                }
            };

            accepted.insert(element.id());
            found.push(RawBlock {
                role,
                fragment: content_fragment(element, content.as_ref()),
            });
        }

        found
    }
}

fn content_fragment(block: ElementRef<'_>, content: Option<&Selector>) -> String {
    content
        .and_then(|selector| block.select(selector).next())
        .unwrap_or(block)
        .inner_html()
}

fn compile(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!("Adapter selector {:?} does not compile: {:?}", raw, e);
            None
        }
    }
}

/// Platform-specific strategy for locating and role-tagging message blocks.
pub trait SiteAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Conventions in fallback order: current layout first.
    fn conventions(&self) -> &'static [MarkupConvention];

    /// Whether `url` is a page where the export control belongs.
    fn handles_url(&self, url: &str) -> bool {
        Platform::from_url(url) == Some(self.platform())
    }

    /// Run the fallback chain over a parsed document.
    fn locate(&self, document: &Html) -> Vec<RawBlock> {
        let platform = self.platform();
        for convention in self.conventions() {
            let blocks = convention.locate(document);
            if !blocks.is_empty() {
                debug!(
                    %platform,
                    convention = convention.name,
                    "Located {} message blocks",
                    blocks.len()
                );
                return blocks;
            }
            debug!(%platform, convention = convention.name, "No blocks, trying next convention");
        }
        Vec::new()
    }

    /// Parse `html` and run the fallback chain.
    fn locate_html(&self, html: &str) -> Vec<RawBlock> {
        self.locate(&Html::parse_document(html))
    }
}

/// Adapter for a platform.
pub fn adapter_for(platform: Platform) -> Box<dyn SiteAdapter> {
    match platform {
        Platform::ChatGPT => Box::new(ChatGptAdapter),
        Platform::Claude => Box::new(ClaudeAdapter),
        Platform::Gemini => Box::new(GeminiAdapter),
    }
}

/// Adapter for the platform serving `url`, if any.
pub fn adapter_for_url(url: &str) -> Option<Box<dyn SiteAdapter>> {
    Platform::from_url(url).map(adapter_for)
}
