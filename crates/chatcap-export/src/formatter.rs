//! Export formatter: canonical conversation to JSON and Markdown.
//!
//! Output depends only on the conversation and the export time passed in, so
//! the same input always yields byte-identical artifacts.

use chatcap_core::{CanonicalConversation, Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const GENERATOR: &str = concat!("chatcap/", env!("CARGO_PKG_VERSION"));

/// Export metadata written next to the conversation in JSON exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    #[serde(rename = "exportedAt")]
    pub exported_at: DateTime<Utc>,
    #[serde(rename = "totalMessages")]
    pub total_messages: usize,
    #[serde(rename = "contentHash")]
    pub content_hash: String,
    pub generator: String,
}

/// Top-level shape of a JSON export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    pub conversation: CanonicalConversation,
}

/// Both renderings of one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifacts {
    pub json: String,
    pub markdown: String,
}

pub fn format(conv: &CanonicalConversation, exported_at: DateTime<Utc>) -> Result<ExportArtifacts> {
    Ok(ExportArtifacts {
        json: to_json(conv, exported_at)?,
        markdown: to_markdown(conv, exported_at),
    })
}

pub fn to_json(conv: &CanonicalConversation, exported_at: DateTime<Utc>) -> Result<String> {
    let doc = ExportDocument {
        metadata: ExportMetadata {
            exported_at,
            total_messages: conv.message_count(),
            content_hash: conv.fingerprint(),
            generator: GENERATOR.to_string(),
        },
        conversation: conv.clone(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Read a JSON export back. The message count must match the metadata.
pub fn parse_json(raw: &str) -> Result<CanonicalConversation> {
    let doc: ExportDocument = serde_json::from_str(raw)?;
    if doc.metadata.total_messages != doc.conversation.message_count() {
        return Err(Error::Export(format!(
            "metadata says {} messages, found {}",
            doc.metadata.total_messages,
            doc.conversation.message_count()
        )));
    }
    Ok(doc.conversation)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn to_markdown(conv: &CanonicalConversation, exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", conv.title));
    out.push_str(&format!("- Platform: {}\n", conv.source_platform.display_name()));
    out.push_str(&format!("- Captured: {}\n", timestamp(&conv.captured_at)));
    out.push_str(&format!("- Exported: {}\n", timestamp(&exported_at)));
    out.push_str(&format!("- Messages: {}\n", conv.message_count()));

    for message in &conv.messages {
        out.push_str("\n---\n\n");
        out.push_str(&format!("### {}\n\n", message.role.label()));
        out.push_str(message.content.text.trim_end());
        out.push('\n');
    }
    out
}
