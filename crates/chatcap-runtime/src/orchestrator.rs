//! Page context orchestrator: owns the extraction state machine for one page.
//!
//! A context is created when the page loads (`spawn` registers it on the bus
//! and injects the export control) and torn down on unload. Between the two it
//! reacts to control clicks, inbound command envelopes, and navigation, which
//! it detects by polling the page location.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chatcap_bus::{Action, Bus, ContextId, CorrelationContext, Delivery, Envelope, Inbox};
use chatcap_core::{CanonicalConversation, CanonicalMessage, CaptureSettings, Error, Result};
use chatcap_extract::{adapter_for_url, derive_title, Sanitizer, SiteAdapter};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::page::{PageHost, CONTROL_ID};
use crate::types::*;

/// Shown to the user, and sent as the failure reason, when a page has no transcript.
pub const NO_CONVERSATION: &str = "No conversation found";

/// Run adapter, sanitizer and title heuristic over one document.
///
/// Returns `None` when no message survives: either the adapter found no
/// blocks or every block sanitized to nothing.
pub fn capture_document(
    adapter: &dyn SiteAdapter,
    sanitizer: &Sanitizer,
    html: &str,
    page_title: &str,
) -> Option<CanonicalConversation> {
    let blocks = adapter.locate_html(html);
    if blocks.is_empty() {
        return None;
    }

    let located = blocks.len();
    let messages: Vec<CanonicalMessage> = blocks
        .into_iter()
        .filter_map(|block| {
            let content = sanitizer.sanitize(&block.fragment);
            (!content.is_empty()).then(|| CanonicalMessage::new(block.role, content))
        })
        .collect();

    if messages.len() < located {
        debug!("Dropped {} blocks with no content", located - messages.len());
    }
    if messages.is_empty() {
        return None;
    }

    let platform = adapter.platform();
    Some(CanonicalConversation {
        title: derive_title(page_title, &messages, platform),
        messages,
        source_platform: platform,
        captured_at: Utc::now(),
    })
}

/// Per-page extraction state.
pub struct PageContext {
    tab_id: u64,
    host: Arc<dyn PageHost>,
    adapter: Box<dyn SiteAdapter>,
    sanitizer: Sanitizer,
    bus: Arc<Bus>,
    settings: CaptureSettings,
    state: ExtractionState,
    /// Set from trigger until the background answers the handoff.
    in_flight: Arc<AtomicBool>,
    last_location: String,
}

impl PageContext {
    /// Create a context for the page currently shown by `host`.
    pub fn new(
        tab_id: u64,
        host: Arc<dyn PageHost>,
        bus: Arc<Bus>,
        settings: CaptureSettings,
    ) -> Result<Self> {
        let location = host.location();
        let adapter = adapter_for_url(&location)
            .ok_or_else(|| Error::UnsupportedPlatform(location.clone()))?;
        let sanitizer = Sanitizer::with_extra(&settings.extra_denylist);

        Ok(Self {
            tab_id,
            host,
            adapter,
            sanitizer,
            bus,
            settings,
            state: ExtractionState::Idle,
            in_flight: Arc::new(AtomicBool::new(false)),
            last_location: location,
        })
    }

    pub fn tab_id(&self) -> u64 {
        self.tab_id
    }

    pub fn state(&self) -> ExtractionState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn id(&self) -> ContextId {
        ContextId::Page(self.tab_id)
    }

    fn transition(&mut self, next: ExtractionState) {
        debug!(tab = self.tab_id, "Extraction {} -> {}", self.state, next);
        self.state = next;
    }

    /// One extraction attempt: IDLE -> PARSING -> SUCCESS | EMPTY -> IDLE.
    pub fn extract(&mut self) -> Option<CanonicalConversation> {
        self.transition(ExtractionState::Parsing);

        let html = self.host.document_html();
        let title = self.host.title();
        let conversation = capture_document(self.adapter.as_ref(), &self.sanitizer, &html, &title);

        match &conversation {
            Some(conv) => {
                self.transition(ExtractionState::Success);
                info!(
                    tab = self.tab_id,
                    platform = %conv.source_platform,
                    "Captured {} messages: {}",
                    conv.message_count(),
                    conv.title
                );
            }
            None => {
                self.transition(ExtractionState::Empty);
                info!(tab = self.tab_id, "{}", NO_CONVERSATION);
            }
        }

        self.transition(ExtractionState::Idle);
        conversation
    }

    /// Insert the export control unless it is already there.
    ///
    /// Returns whether a control was inserted.
    pub fn ensure_control(&self) -> bool {
        if !self.adapter.handles_url(&self.host.location()) {
            return false;
        }
        if self.host.has_control(CONTROL_ID) {
            return false;
        }
        self.host.insert_control(CONTROL_ID);
        info!(tab = self.tab_id, "Export control inserted");
        true
    }

    /// User clicked the export control.
    ///
    /// Must run inside a tokio runtime: the handoff reply is awaited on a
    /// spawned task.
    pub fn trigger(&mut self) -> TriggerOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!(tab = self.tab_id, "Trigger ignored, extraction in flight");
            return TriggerOutcome::Busy;
        }

        let Some(conversation) = self.extract() else {
            self.in_flight.store(false, Ordering::SeqCst);
            self.host.notify(NO_CONVERSATION);
            return TriggerOutcome::Empty;
        };

        let envelope =
            Envelope::content_ready(CorrelationContext::for_tab(self.tab_id), &conversation);
        let in_flight = Arc::clone(&self.in_flight);
        let host = Arc::clone(&self.host);
        let tab = self.tab_id;

        self.bus.send_with(
            self.id(),
            ContextId::Background,
            envelope,
            Some(self.settings.reply_timeout()),
            move |reply| {
                in_flight.store(false, Ordering::SeqCst);
                match reply {
                    Ok(_) => debug!(tab, "Background accepted conversation"),
                    Err(e) => {
                        warn!(tab, "Handoff to background failed: {}", e);
                        host.notify(&format!("Export failed: {}", e));
                    }
                }
            },
        );

        TriggerOutcome::Sent
    }

    fn handle_delivery(&mut self, delivery: Delivery) {
        let Delivery {
            from,
            envelope,
            responder,
        } = delivery;

        match envelope.action {
            Action::ExportRequest => {
                let reply = if self.is_in_flight() {
                    Envelope::content_failed(envelope.context, "Extraction already in progress")
                } else {
                    match self.extract() {
                        Some(conv) => Envelope::content_ready(envelope.context, &conv),
                        None => Envelope::content_failed(envelope.context, NO_CONVERSATION),
                    }
                };
                responder.respond(reply);
            }
            Action::Ping => responder.respond(envelope.reply(Action::Ping)),
            other => {
                debug!(tab = self.tab_id, %from, action = ?other, "Ignoring envelope");
            }
        }
    }

    /// Returns true when the location changed since the last poll.
    fn poll_location(&mut self) -> bool {
        let current = self.host.location();
        if current == self.last_location {
            return false;
        }
        debug!(
            tab = self.tab_id,
            "Navigation {} -> {}", self.last_location, current
        );
        self.last_location = current;
        true
    }

    /// Event loop of the page context. Returns after unload.
    pub async fn run(mut self, mut inbox: Inbox, mut events: mpsc::UnboundedReceiver<PageEvent>) {
        let mut poll = tokio::time::interval(self.settings.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut settle_at: Option<Instant> = None;

        self.ensure_control();

        loop {
            let settle = async move {
                match settle_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = poll.tick() => {
                    if self.poll_location() {
                        settle_at = Some(Instant::now() + self.settings.settle_delay());
                    }
                }
                _ = settle => {
                    settle_at = None;
                    self.ensure_control();
                }
                event = events.recv() => match event {
                    Some(PageEvent::ControlClicked(reply)) => {
                        let outcome = self.trigger();
                        if let Some(tx) = reply {
                            let _ = tx.send(outcome);
                        }
                    }
                    Some(PageEvent::Unload) | None => break,
                },
                delivery = inbox.recv() => match delivery {
                    Some(delivery) => self.handle_delivery(delivery),
                    None => break,
                },
            }
        }

        self.bus.unregister(self.id());
        if let Err(e) = self.bus.post(self.id(), ContextId::Background, Envelope::page_closed(self.tab_id)) {
            debug!(tab = self.tab_id, "Teardown notice not delivered: {}", e);
        }
        info!(tab = self.tab_id, "Page context torn down");
    }

    /// Register on the bus and run the context on its own task.
    pub fn spawn(self) -> PageHandle {
        let inbox = self.bus.register(self.id());
        let (events, rx) = mpsc::unbounded_channel();
        let tab_id = self.tab_id;
        let task = tokio::spawn(self.run(inbox, rx));
        PageHandle {
            tab_id,
            events,
            task,
        }
    }
}

/// Host-side handle to a running page context.
pub struct PageHandle {
    tab_id: u64,
    events: mpsc::UnboundedSender<PageEvent>,
    task: JoinHandle<()>,
}

impl PageHandle {
    pub fn tab_id(&self) -> u64 {
        self.tab_id
    }

    /// Click the export control. `None` if the context is gone.
    pub async fn click(&self) -> Option<TriggerOutcome> {
        let (tx, rx) = oneshot::channel();
        self.events.send(PageEvent::ControlClicked(Some(tx))).ok()?;
        rx.await.ok()
    }

    /// Unload the page and wait for teardown.
    pub async fn unload(self) {
        let _ = self.events.send(PageEvent::Unload);
        if let Err(e) = self.task.await {
            warn!(tab = self.tab_id, "Page context task failed: {}", e);
        }
    }
}
