//! Record submitted to a conversation-storage backend.

use chatcap_core::CanonicalConversation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMessage {
    pub role: String,
    pub content: String,
}

/// `{ title, messages, tokenCount?, model?, tags }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub title: String,
    pub messages: Vec<RecordMessage>,
    #[serde(rename = "tokenCount", skip_serializing_if = "Option::is_none", default)]
    pub token_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

impl ConversationRecord {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl From<&CanonicalConversation> for ConversationRecord {
    fn from(conv: &CanonicalConversation) -> Self {
        let messages: Vec<RecordMessage> = conv
            .messages
            .iter()
            .map(|m| RecordMessage {
                role: m.role.name().to_string(),
                content: m.content.text.clone(),
            })
            .collect();
        let tokens = messages.iter().map(|m| estimate_tokens(&m.content)).sum();

        Self {
            title: conv.title.clone(),
            messages,
            token_count: Some(tokens),
            model: None,
            tags: vec![conv.source_platform.name().to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatcap_core::{CanonicalMessage, MessageContent, Platform, Role};
    use chrono::Utc;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_record_from_conversation() {
        let conv = CanonicalConversation {
            title: "Hi - Claude".into(),
            messages: vec![
                CanonicalMessage::new(Role::User, MessageContent::plain("Hello")),
                CanonicalMessage::new(Role::Assistant, MessageContent::plain("Hi!")),
            ],
            source_platform: Platform::Claude,
            captured_at: Utc::now(),
        };
        let record = ConversationRecord::from(&conv).with_model("claude-3-haiku");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "Hi!");
        assert_eq!(value["tokenCount"], 3);
        assert_eq!(value["model"], "claude-3-haiku");
        assert_eq!(value["tags"], serde_json::json!(["claude"]));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let raw = r#"{"title":"t","messages":[]}"#;
        let record: ConversationRecord = serde_json::from_str(raw).unwrap();
        assert!(record.token_count.is_none());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("tokenCount").is_none());
        assert!(value.get("model").is_none());
    }
}
