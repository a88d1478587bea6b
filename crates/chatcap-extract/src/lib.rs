//! chatcap extract: locating, cleaning and titling chat transcripts in page markup.
//!
//! Site adapters find message blocks with an ordered fallback chain of markup
//! conventions per platform, the sanitizer turns each block into a
//! `{text, markup}` pair, and the title heuristic names the conversation.

pub mod adapters;
pub mod sanitize;
pub mod title;

pub use adapters::{adapter_for, adapter_for_url, MarkupConvention, RawBlock, RoleRule, SiteAdapter};
pub use sanitize::Sanitizer;
pub use title::{derive_title, document_title, strip_platform_suffix, PLACEHOLDER_STEM, TITLE_MAX_CHARS};
