//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Paths to chatcap data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Export artifacts (`data/exports/`).
    pub exports: PathBuf,
    /// Capture settings (`data/settings.json`).
    pub settings_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            exports: root.join("exports"),
            settings_file: root.join("settings.json"),
            root,
        };
        std::fs::create_dir_all(&paths.exports)?;
        Ok(paths)
    }
}

/// Timing and sanitizer knobs shared by the page, background and preview contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(rename = "pollIntervalMs", default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(rename = "settleDelayMs", default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(rename = "replyTimeoutMs", default = "default_reply_timeout")]
    pub reply_timeout_ms: u64,
    /// Extra sanitizer denylist selectors appended to the built-in list.
    #[serde(rename = "extraDenylist", default)]
    pub extra_denylist: Vec<String>,
    /// Path to the settings file (not serialized).
    #[serde(skip)]
    pub settings_path: PathBuf,
}

fn default_poll_interval() -> u64 {
    1000
}
fn default_settle_delay() -> u64 {
    500
}
fn default_reply_timeout() -> u64 {
    5000
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            settle_delay_ms: default_settle_delay(),
            reply_timeout_ms: default_reply_timeout(),
            extra_denylist: Vec::new(),
            settings_path: PathBuf::new(),
        }
    }
}

impl CaptureSettings {
    /// Load settings from a JSON file, or return defaults.
    pub fn load(settings_path: &Path) -> Self {
        let mut settings: CaptureSettings = match std::fs::read_to_string(settings_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", settings_path.display(), e);
                Self::default()
            }),
            Err(_) => {
                debug!("No settings at {}, using defaults", settings_path.display());
                Self::default()
            }
        };
        settings.settings_path = settings_path.to_path_buf();
        settings
    }

    /// Save settings to disk.
    pub fn save(&self) -> crate::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Top-level chatcap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatcapConfig {
    /// HTTP port of the local preview server.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Capture timing and sanitizer settings.
    pub capture: CaptureSettings,
}

impl ChatcapConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3017);

        let data_paths = DataPaths::new(data_dir)?;
        let capture = CaptureSettings::load(&data_paths.settings_file);

        Ok(Self {
            port,
            data_paths,
            capture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CaptureSettings::load(&dir.path().join("settings.json"));
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.settle_delay(), Duration::from_millis(500));
        assert_eq!(settings.reply_timeout(), Duration::from_secs(5));
        assert!(settings.extra_denylist.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"settleDelayMs": 250, "extraDenylist": [".badge"]}"#).unwrap();

        let settings = CaptureSettings::load(&path);
        assert_eq!(settings.settle_delay_ms, 250);
        assert_eq!(settings.poll_interval_ms, 1000);
        assert_eq!(settings.extra_denylist, vec![".badge".to_string()]);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = CaptureSettings::load(&path);
        settings.reply_timeout_ms = 1234;
        settings.save().unwrap();

        let reloaded = CaptureSettings::load(&path);
        assert_eq!(reloaded.reply_timeout_ms, 1234);
        assert_eq!(reloaded.settings_path, path);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(CaptureSettings::load(&path).poll_interval_ms, 1000);
    }

    #[test]
    fn test_data_paths_created() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data")).unwrap();
        assert!(paths.exports.is_dir());
        assert_eq!(paths.settings_file.file_name().unwrap(), "settings.json");
    }
}
