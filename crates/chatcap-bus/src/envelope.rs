//! Envelope wire types exchanged between contexts.

use chatcap_core::{CanonicalConversation, CanonicalMessage, MessageContent, Platform, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an envelope asks for or announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Ask a page (directly or through the background) for its transcript.
    ExportRequest,
    /// A captured conversation is attached.
    ContentReady,
    /// Extraction or delivery failed; `error` says why.
    ContentFailed,
    /// Liveness check; answered with another `ping`.
    Ping,
    /// The sending page is tearing down. Carries its `tabId`.
    PageClosed,
    /// Any tag this build does not know. Ignored by every context.
    #[serde(other)]
    Unknown,
}

/// Opaque routing data that travels with a request and its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    pub id: Uuid,
    #[serde(rename = "tabId", default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<u64>,
}

impl CorrelationContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            tab_id: None,
        }
    }

    pub fn for_tab(tab_id: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            tab_id: Some(tab_id),
        }
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A message as carried on the bus: author is a display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMessage {
    pub author: String,
    pub content: MessageContent,
}

/// Conversation payload of a `content-ready` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPayload {
    pub title: String,
    #[serde(rename = "sourcePlatform")]
    pub source_platform: Platform,
    #[serde(rename = "capturedAt")]
    pub captured_at: DateTime<Utc>,
    pub messages: Vec<PayloadMessage>,
}

impl From<&CanonicalConversation> for ConversationPayload {
    fn from(conv: &CanonicalConversation) -> Self {
        Self {
            title: conv.title.clone(),
            source_platform: conv.source_platform,
            captured_at: conv.captured_at,
            messages: conv
                .messages
                .iter()
                .map(|m| PayloadMessage {
                    author: m.role.label().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

impl ConversationPayload {
    /// Rebuild the canonical conversation on the receiving side.
    pub fn into_canonical(self) -> chatcap_core::Result<CanonicalConversation> {
        if self.title.trim().is_empty() {
            return Err(chatcap_core::Error::Payload("empty title".into()));
        }
        if self.messages.is_empty() {
            return Err(chatcap_core::Error::Payload("no messages".into()));
        }

        let messages = self
            .messages
            .into_iter()
            .map(|m| {
                Role::from_name(&m.author)
                    .map(|role| CanonicalMessage::new(role, m.content))
                    .ok_or_else(|| {
                        chatcap_core::Error::Payload(format!("unknown author {:?}", m.author))
                    })
            })
            .collect::<chatcap_core::Result<Vec<_>>>()?;

        Ok(CanonicalConversation {
            title: self.title,
            messages,
            source_platform: self.source_platform,
            captured_at: self.captured_at,
        })
    }
}

/// The unit exchanged over the bus. Consumed once by its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub action: Action,
    #[serde(rename = "correlationContext", default)]
    pub context: CorrelationContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ConversationPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn new(action: Action, context: CorrelationContext) -> Self {
        Self {
            action,
            context,
            data: None,
            error: None,
        }
    }

    pub fn export_request(tab_id: u64) -> Self {
        Self::new(Action::ExportRequest, CorrelationContext::for_tab(tab_id))
    }

    pub fn ping() -> Self {
        Self::new(Action::Ping, CorrelationContext::new())
    }

    pub fn page_closed(tab_id: u64) -> Self {
        Self::new(Action::PageClosed, CorrelationContext::for_tab(tab_id))
    }

    pub fn content_ready(context: CorrelationContext, conv: &CanonicalConversation) -> Self {
        Self {
            data: Some(ConversationPayload::from(conv)),
            ..Self::new(Action::ContentReady, context)
        }
    }

    pub fn content_failed(context: CorrelationContext, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(Action::ContentFailed, context)
        }
    }

    /// An empty envelope answering this one, on the same correlation context.
    pub fn reply(&self, action: Action) -> Self {
        Self::new(action, self.context)
    }

    pub fn to_json(&self) -> chatcap_core::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> chatcap_core::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> CanonicalConversation {
        CanonicalConversation {
            title: "Sorting - ChatGPT".into(),
            messages: vec![
                CanonicalMessage::new(Role::User, MessageContent::plain("sort?")),
                CanonicalMessage::new(
                    Role::Assistant,
                    MessageContent {
                        text: "Use sort().".into(),
                        markup: "<p>Use <code>sort()</code>.</p>".into(),
                    },
                ),
            ],
            source_platform: Platform::ChatGPT,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_content_ready_wire_shape() {
        let env = Envelope::content_ready(CorrelationContext::for_tab(7), &conversation());
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(value["action"], "content-ready");
        assert_eq!(value["correlationContext"]["tabId"], 7);
        assert_eq!(value["data"]["messages"][0]["author"], "User");
        assert_eq!(value["data"]["messages"][1]["content"]["markup"], "<p>Use <code>sort()</code>.</p>");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_payload_back_to_canonical() {
        let conv = conversation();
        let payload = ConversationPayload::from(&conv);
        assert_eq!(payload.into_canonical().unwrap(), conv);
    }

    #[test]
    fn test_payload_rejects_unknown_author() {
        let mut payload = ConversationPayload::from(&conversation());
        payload.messages[0].author = "Narrator".into();
        assert!(payload.into_canonical().is_err());
    }

    #[test]
    fn test_unrecognised_action_parses_as_unknown() {
        let env = Envelope::from_json(r#"{"action":"open-sidebar","extra":true}"#).unwrap();
        assert_eq!(env.action, Action::Unknown);
        assert!(env.data.is_none());
    }

    #[test]
    fn test_page_closed_wire_shape() {
        let value = serde_json::to_value(Envelope::page_closed(12)).unwrap();
        assert_eq!(value["action"], "page-closed");
        assert_eq!(value["correlationContext"]["tabId"], 12);
    }

    #[test]
    fn test_failure_envelope() {
        let request = Envelope::export_request(3);
        let failed = Envelope::content_failed(request.context, "No conversation found");
        assert_eq!(failed.context, request.context);
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["action"], "content-failed");
        assert_eq!(value["error"], "No conversation found");
    }
}
