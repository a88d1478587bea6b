//! Shared application state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatcap_bus::Bus;
use chatcap_core::{CanonicalConversation, CaptureSettings, ChatcapConfig, Error, Result};
use chatcap_runtime::{Coordinator, PageContext, PreviewSurface, SnapshotPage, TriggerOutcome};
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// What one capture request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Captured(CanonicalConversation),
    /// The page had no conversation markup.
    Empty,
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ChatcapConfig,
    pub capture_settings: RwLock<CaptureSettings>,
    pub bus: Arc<Bus>,
    pub preview: PreviewSurface,
    next_tab: AtomicU64,
    /// One snapshot capture at a time; they share the preview surface.
    capture_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Start the background and preview contexts. Must run inside a tokio runtime.
    pub fn new(config: ChatcapConfig) -> Self {
        let bus = Arc::new(Bus::new());
        Coordinator::new(Arc::clone(&bus), &config.capture).spawn();
        let preview = PreviewSurface::open(Arc::clone(&bus), &config.capture);
        info!("Background and preview contexts started");

        Self {
            capture_settings: RwLock::new(config.capture.clone()),
            config,
            bus,
            preview,
            next_tab: AtomicU64::new(1),
            capture_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn next_tab_id(&self) -> u64 {
        self.next_tab.fetch_add(1, Ordering::SeqCst)
    }

    /// Load a page snapshot into a fresh page context, click its export
    /// control, and wait for the preview surface to receive the result.
    pub async fn capture(&self, url: &str, title: &str, html: &str) -> Result<CaptureOutcome> {
        let _guard = self.capture_lock.lock().await;
        let settings = self.capture_settings.read().clone();
        let timeout = settings.reply_timeout();

        let tab_id = self.next_tab_id();
        let page = SnapshotPage::new(url, title, html);
        let handle = PageContext::new(tab_id, Arc::new(page), Arc::clone(&self.bus), settings)?.spawn();

        let seen = self.preview.revision();
        let outcome = match handle.click().await {
            Some(TriggerOutcome::Sent) => self.await_capture(tab_id, seen, timeout).await,
            Some(TriggerOutcome::Empty) => Ok(CaptureOutcome::Empty),
            Some(TriggerOutcome::Busy) | None => {
                Err(Error::Internal(format!("page context {} unavailable", tab_id)))
            }
        };

        handle.unload().await;
        outcome
    }

    /// Wait for the preview to show the capture from `tab_id`, or a failure
    /// reported after `seen`.
    async fn await_capture(&self, tab_id: u64, mut seen: u64, timeout: Duration) -> Result<CaptureOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.preview.wait_for_update(seen, remaining).await {
                return Err(Error::Delivery(format!(
                    "preview not updated within {:?}",
                    timeout
                )));
            }
            seen = self.preview.revision();

            if let Some(conversation) = self.preview.latest_from_tab(tab_id) {
                return Ok(CaptureOutcome::Captured(conversation));
            }
            if let Some(reason) = self.preview.last_error() {
                return Err(Error::Remote(reason));
            }
            debug!(tab = tab_id, "Preview updated from another tab, still waiting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatcap_bus::{ContextId, CorrelationContext, Envelope};
    use chatcap_core::{CanonicalMessage, MessageContent, Platform, Role};

    fn state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatcapConfig::from_env(dir.path()).unwrap();
        (AppState::new(config), dir)
    }

    fn conversation(text: &str) -> CanonicalConversation {
        CanonicalConversation {
            title: format!("{} - Claude", text),
            messages: vec![CanonicalMessage::new(Role::User, MessageContent::plain(text))],
            source_platform: Platform::Claude,
            captured_at: chrono::Utc::now(),
        }
    }

    async fn push(state: &AppState, envelope: Envelope) {
        let reply = state.bus.send(ContextId::Background, ContextId::Preview, envelope).wait().await;
        assert!(reply.is_ok());
    }

    #[tokio::test]
    async fn test_failure_after_earlier_capture_is_not_reported_as_captured() {
        let (state, _dir) = state();
        push(&state, Envelope::content_ready(CorrelationContext::for_tab(900), &conversation("old"))).await;

        let seen = state.preview.revision();
        let failed = Envelope::content_failed(CorrelationContext::for_tab(5), "No conversation found");
        let (outcome, _) = tokio::join!(
            state.await_capture(5, seen, Duration::from_secs(2)),
            push(&state, failed)
        );
        match outcome {
            Err(Error::Remote(reason)) => assert_eq!(reason, "No conversation found"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_waits_past_updates_from_other_tabs() {
        let (state, _dir) = state();
        let seen = state.preview.revision();
        let mine = conversation("mine");

        let pushes = async {
            push(&state, Envelope::content_ready(CorrelationContext::for_tab(41), &conversation("other"))).await;
            push(&state, Envelope::content_ready(CorrelationContext::for_tab(42), &mine)).await;
        };
        let (outcome, _) = tokio::join!(state.await_capture(42, seen, Duration::from_secs(2)), pushes);
        assert_eq!(outcome.unwrap(), CaptureOutcome::Captured(mine.clone()));
    }

    #[tokio::test]
    async fn test_capture_returns_its_own_page() {
        let (state, _dir) = state();
        push(&state, Envelope::content_ready(CorrelationContext::for_tab(900), &conversation("old"))).await;

        let html = r#"<html><body><main><div data-message-author-role="user"><div class="markdown"><p>fresh question</p></div></div></main></body></html>"#;
        match state.capture("https://chatgpt.com/c/1", "", html).await.unwrap() {
            CaptureOutcome::Captured(conv) => {
                assert_eq!(conv.messages[0].content.text, "fresh question");
                assert_eq!(conv.source_platform, Platform::ChatGPT);
            }
            other => panic!("expected a capture, got {:?}", other),
        }
    }
}
