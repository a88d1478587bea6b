//! Runtime types.

use serde::Serialize;
use tokio::sync::oneshot;

/// Per-page extraction state. Every attempt returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionState {
    Idle,
    Parsing,
    /// At least one message was captured.
    Success,
    /// The page had no message markup.
    Empty,
}

impl std::fmt::Display for ExtractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Success => "success",
            Self::Empty => "empty",
        };
        write!(f, "{}", name)
    }
}

/// What a user trigger on the page led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOutcome {
    /// A conversation was handed to the background.
    Sent,
    /// Nothing to capture; the user was told so.
    Empty,
    /// An earlier extraction is still awaiting delivery.
    Busy,
}

/// Host-side events fed into a running page context.
#[derive(Debug)]
pub enum PageEvent {
    /// The injected control was clicked. The outcome is reported back if the
    /// sender still listens.
    ControlClicked(Option<oneshot::Sender<TriggerOutcome>>),
    /// The page is going away; the context tears down.
    Unload,
}
