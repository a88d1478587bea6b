//! Claude transcript markup.

use chatcap_core::{Platform, Role};

use super::{MarkupConvention, RoleRule, SiteAdapter};

const CONVENTIONS: &[MarkupConvention] = &[
    MarkupConvention {
        name: "testid-and-response-class",
        blocks: "[data-testid=\"user-message\"], .font-claude-message",
        content: None,
        roles: RoleRule::UserSelector("[data-testid=\"user-message\"]"),
    },
    MarkupConvention {
        name: "conversation-item",
        blocks: ".ConversationItem--human, .ConversationItem--ai",
        content: Some(".ConversationItem__body"),
        roles: RoleRule::UserSelector(".ConversationItem--human"),
    },
    // Render-count wrappers carry no author signal at all.
    MarkupConvention {
        name: "render-count",
        blocks: "div[data-test-render-count]",
        content: None,
        roles: RoleRule::Alternating { first: Role::User },
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeAdapter;

impl SiteAdapter for ClaudeAdapter {
    fn platform(&self) -> Platform {
        Platform::Claude
    }

    fn conventions(&self) -> &'static [MarkupConvention] {
        CONVENTIONS
    }
}
