//! Preview surface: the user-facing context showing what was captured.

use std::sync::Arc;
use std::time::Duration;

use chatcap_bus::{Action, Bus, ContextId, Delivery, Envelope, Inbox};
use chatcap_core::{CanonicalConversation, CaptureSettings, Error, Result};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Characters of each message shown in the text preview.
const SNIPPET_CHARS: usize = 80;

#[derive(Debug, Default)]
struct PreviewState {
    latest: Option<CanonicalConversation>,
    /// Tab the latest conversation was captured in, when known.
    latest_tab: Option<u64>,
    last_error: Option<String>,
}

/// Handle to the preview context. Clones share the same surface.
#[derive(Clone)]
pub struct PreviewSurface {
    bus: Arc<Bus>,
    reply_timeout: Duration,
    state: Arc<RwLock<PreviewState>>,
    revision: watch::Sender<u64>,
}

impl PreviewSurface {
    /// Register the preview context on the bus and start listening for pushes.
    pub fn open(bus: Arc<Bus>, settings: &CaptureSettings) -> Self {
        let (revision, _) = watch::channel(0);
        let surface = Self {
            bus: Arc::clone(&bus),
            reply_timeout: settings.reply_timeout(),
            state: Arc::new(RwLock::new(PreviewState::default())),
            revision,
        };

        let inbox = bus.register(ContextId::Preview);
        tokio::spawn(surface.clone().listen(inbox));
        surface
    }

    async fn listen(self, mut inbox: Inbox) {
        while let Some(delivery) = inbox.recv().await {
            self.handle_delivery(delivery);
        }
        debug!("Preview listener stopped");
    }

    fn handle_delivery(&self, delivery: Delivery) {
        let Delivery {
            from,
            envelope,
            responder,
        } = delivery;

        match envelope.action {
            Action::ContentReady | Action::ContentFailed => match self.apply(envelope) {
                Err(Error::Payload(reason)) => responder.reject(reason),
                Ok(_) | Err(_) => responder.acknowledge(),
            },
            Action::Ping => responder.respond(envelope.reply(Action::Ping)),
            other => debug!(%from, action = ?other, "Preview ignoring envelope"),
        }
    }

    /// Fold a content-ready or content-failed envelope into the surface.
    fn apply(&self, envelope: Envelope) -> Result<CanonicalConversation> {
        let tab_id = envelope.context.tab_id;
        let result = match (envelope.action, envelope.data) {
            (Action::ContentReady, Some(payload)) => payload.into_canonical(),
            (Action::ContentReady, None) => Err(Error::Payload("content-ready without data".into())),
            _ => Err(Error::Remote(
                envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        };

        {
            let mut state = self.state.write();
            match &result {
                Ok(conversation) => {
                    info!(
                        "Preview updated: {} ({} messages)",
                        conversation.title,
                        conversation.message_count()
                    );
                    state.latest = Some(conversation.clone());
                    state.latest_tab = tab_id;
                    state.last_error = None;
                }
                Err(Error::Remote(reason)) => {
                    warn!("Capture failed upstream: {}", reason);
                    state.last_error = Some(reason.clone());
                }
                Err(e) => {
                    warn!("Preview received a bad update: {}", e);
                    state.last_error = Some(e.to_string());
                }
            }
        }
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    pub fn latest(&self) -> Option<CanonicalConversation> {
        self.state.read().latest.clone()
    }

    /// The latest conversation, only if it came from `tab_id` and no
    /// failure has been reported since.
    pub fn latest_from_tab(&self, tab_id: u64) -> Option<CanonicalConversation> {
        let state = self.state.read();
        match (&state.latest, state.latest_tab, &state.last_error) {
            (Some(conv), Some(tab), None) if tab == tab_id => Some(conv.clone()),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    /// Bumped on every update, success or failure.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Wait until the revision moves past `seen`. False on timeout.
    pub async fn wait_for_update(&self, seen: u64, limit: Duration) -> bool {
        let mut rx = self.revision.subscribe();
        tokio::time::timeout(limit, rx.wait_for(|rev| *rev > seen))
            .await
            .is_ok_and(|changed| changed.is_ok())
    }

    /// Whether the page context of `tab_id` answers a ping.
    pub async fn is_page_alive(&self, tab_id: u64) -> bool {
        let reply = self
            .bus
            .send(ContextId::Preview, ContextId::Page(tab_id), Envelope::ping())
            .wait_timeout(self.reply_timeout)
            .await;
        matches!(reply, Ok(Some(env)) if env.action == Action::Ping)
    }

    /// Ask the background to fetch a fresh capture from `tab_id`.
    ///
    /// Waits twice the reply timeout: the background gives up on the page
    /// after one and answers with `content-failed`.
    pub async fn request_export(&self, tab_id: u64) -> Result<CanonicalConversation> {
        let reply = self
            .bus
            .send(ContextId::Preview, ContextId::Background, Envelope::export_request(tab_id))
            .wait_timeout(self.reply_timeout * 2)
            .await;

        match reply {
            Ok(Some(envelope)) => self.apply(envelope),
            Ok(None) => {
                let e = Error::Remote("background acknowledged without content".into());
                self.state.write().last_error = Some(e.to_string());
                Err(e)
            }
            Err(e) => {
                let e = Error::from(e);
                self.state.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Plain-text summary of what the surface currently shows.
    pub fn render_preview(&self) -> String {
        let state = self.state.read();
        let Some(conv) = &state.latest else {
            return match &state.last_error {
                Some(e) => format!("Export failed: {}", e),
                None => "No conversation captured yet".to_string(),
            };
        };

        let mut out = format!(
            "{}\n{} | {} messages | captured {}\n",
            conv.title,
            conv.source_platform.display_name(),
            conv.message_count(),
            conv.captured_at.format("%Y-%m-%d %H:%M UTC")
        );
        for message in &conv.messages {
            let collapsed = message.content.text.split_whitespace().collect::<Vec<_>>().join(" ");
            let mut snippet: String = collapsed.chars().take(SNIPPET_CHARS).collect();
            if collapsed.chars().count() > SNIPPET_CHARS {
                snippet.push_str("...");
            }
            out.push_str(&format!("\n{}: {}", message.role.label(), snippet));
        }
        out
    }
}
