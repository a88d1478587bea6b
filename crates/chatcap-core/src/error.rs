//! Error types for chatcap.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Remote context reported: {0}")]
    Remote(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
