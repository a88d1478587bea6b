//! Gemini transcript markup.

use chatcap_core::Platform;

use super::{MarkupConvention, RoleRule, SiteAdapter};

const CONVENTIONS: &[MarkupConvention] = &[
    MarkupConvention {
        name: "custom-elements",
        blocks: "user-query, model-response",
        content: Some(".query-text, message-content"),
        roles: RoleRule::UserSelector("user-query"),
    },
    MarkupConvention {
        name: "content-classes",
        blocks: ".query-content, .response-content",
        content: None,
        roles: RoleRule::UserSelector(".query-content"),
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

impl SiteAdapter for GeminiAdapter {
    fn platform(&self) -> Platform {
        Platform::Gemini
    }

    fn conventions(&self) -> &'static [MarkupConvention] {
        CONVENTIONS
    }
}
