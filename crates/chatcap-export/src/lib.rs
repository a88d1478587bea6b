//! chatcap export: downloadable artifacts and backend records for a captured conversation.

pub mod files;
pub mod formatter;
pub mod record;

pub use files::{file_stem, safe_title, write_exports, ExportPaths};
pub use formatter::{format, parse_json, to_json, to_markdown, ExportArtifacts, ExportDocument, ExportMetadata};
pub use record::{estimate_tokens, ConversationRecord, RecordMessage};
