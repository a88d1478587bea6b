//! Export file naming and writing.

use std::path::{Path, PathBuf};

use chatcap_core::{CanonicalConversation, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::formatter;

const MAX_TITLE_CHARS: usize = 50;

/// Paths of the files written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Title reduced to filename-safe characters.
pub fn safe_title(title: &str) -> String {
    let safe: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' || c == '-' { c } else { '_' })
        .take(MAX_TITLE_CHARS)
        .collect();
    let safe = safe.trim();
    if safe.is_empty() {
        "conversation".to_string()
    } else {
        safe.to_string()
    }
}

/// File name without extension: safe title plus a filesystem-safe UTC timestamp.
pub fn file_stem(title: &str, exported_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        safe_title(title),
        exported_at.format("%Y-%m-%dT%H-%M-%SZ")
    )
}

/// Write `<stem>.json` and `<stem>.md` into `dir`, creating it if needed.
pub fn write_exports(
    dir: &Path,
    conv: &CanonicalConversation,
    exported_at: DateTime<Utc>,
) -> Result<ExportPaths> {
    std::fs::create_dir_all(dir)?;

    let artifacts = formatter::format(conv, exported_at)?;
    let stem = file_stem(&conv.title, exported_at);
    let paths = ExportPaths {
        json: dir.join(format!("{}.json", stem)),
        markdown: dir.join(format!("{}.md", stem)),
    };

    std::fs::write(&paths.json, artifacts.json)?;
    std::fs::write(&paths.markdown, artifacts.markdown)?;

    info!(
        "Exported {} messages to {}",
        conv.message_count(),
        paths.json.display()
    );
    Ok(paths)
}
