//! Canonical conversation types shared by every execution context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Supported AI chat platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "chatgpt")]
    ChatGPT,
    Claude,
    Gemini,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[Self::ChatGPT, Self::Claude, Self::Gemini]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ChatGPT => "chatgpt",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        }
    }

    /// Human-facing name, as the platform brands itself in page titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ChatGPT => "ChatGPT",
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Self::ChatGPT => "https://chatgpt.com",
            Self::Claude => "https://claude.ai",
            Self::Gemini => "https://gemini.google.com",
        }
    }

    pub fn hosts(&self) -> &'static [&'static str] {
        match self {
            Self::ChatGPT => &["chatgpt.com", "chat.openai.com"],
            Self::Claude => &["claude.ai"],
            Self::Gemini => &["gemini.google.com"],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "chatgpt" => Some(Self::ChatGPT),
            "claude" => Some(Self::Claude),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Resolve the platform serving `url` by host (subdomains included).
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        Self::all().iter().copied().find(|platform| {
            platform
                .hosts()
                .iter()
                .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
        })
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Display label used in envelopes and Markdown exports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }

    /// Parse a role name or display label, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "user" | "human" => Some(Self::User),
            "assistant" | "ai" | "model" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// The role expected after this one in a strictly alternating transcript.
    pub fn alternate(&self) -> Self {
        match self {
            Self::User => Self::Assistant,
            Self::Assistant | Self::System => Self::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Dual representation of a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Plain text, always populated when the block had any text.
    pub text: String,
    /// Sanitized markup; empty when cleanup fell back to plain text.
    pub markup: String,
}

impl MessageContent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.markup.is_empty()
    }
}

/// A single normalized message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl CanonicalMessage {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self { role, content }
    }
}

/// A normalized, platform-agnostic conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalConversation {
    pub title: String,
    pub messages: Vec<CanonicalMessage>,
    #[serde(rename = "sourcePlatform")]
    pub source_platform: Platform,
    #[serde(rename = "capturedAt")]
    pub captured_at: DateTime<Utc>,
}

impl CanonicalConversation {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// First user-authored message, if any.
    pub fn first_user_message(&self) -> Option<&CanonicalMessage> {
        self.messages.iter().find(|m| m.role == Role::User)
    }

    /// SHA-256 over platform, roles and message text.
    ///
    /// Title and capture time are excluded so a re-capture of an unchanged
    /// transcript yields the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_platform.name().as_bytes());
        hasher.update(b"\n");
        for message in &self.messages {
            hasher.update(message.role.name().as_bytes());
            hasher.update(b"\0");
            hasher.update(message.content.text.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}
