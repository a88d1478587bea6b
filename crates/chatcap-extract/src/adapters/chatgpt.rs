//! ChatGPT transcript markup.

use chatcap_core::{Platform, Role};

use super::{MarkupConvention, RoleRule, SiteAdapter};

const CONVENTIONS: &[MarkupConvention] = &[
    MarkupConvention {
        name: "author-role-attribute",
        blocks: "[data-message-author-role]",
        content: Some(".markdown, .whitespace-pre-wrap"),
        roles: RoleRule::Attribute("data-message-author-role"),
    },
    // Turn articles without the author attribute.
    MarkupConvention {
        name: "conversation-turn",
        blocks: "[data-testid^=\"conversation-turn-\"]",
        content: Some(".markdown, .whitespace-pre-wrap"),
        roles: RoleRule::Alternating { first: Role::User },
    },
    // Pre-2024 thread layout.
    MarkupConvention {
        name: "group-thread",
        blocks: "div.group.w-full",
        content: Some(".markdown, .whitespace-pre-wrap"),
        roles: RoleRule::Alternating { first: Role::User },
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ChatGptAdapter;

impl SiteAdapter for ChatGptAdapter {
    fn platform(&self) -> Platform {
        Platform::ChatGPT
    }

    fn conventions(&self) -> &'static [MarkupConvention] {
        CONVENTIONS
    }
}
