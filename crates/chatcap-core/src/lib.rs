//! chatcap core: canonical conversation model, platforms, errors, configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CaptureSettings, ChatcapConfig, DataPaths};
pub use error::{Error, Result};
pub use types::*;
