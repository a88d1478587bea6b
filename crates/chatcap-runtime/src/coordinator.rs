//! Background coordinator.
//!
//! Keeps the latest conversation per tab, pushes captures to the preview
//! surface, and relays export requests from the preview to the page that
//! owns the tab. Relayed requests are completed later from a spawned task
//! through the original delivery's responder.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chatcap_bus::{Action, Bus, ContextId, Delivery, Envelope, Inbox, Responder};
use chatcap_core::{CanonicalConversation, CaptureSettings};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A conversation a page returned for a relayed export request.
type Completion = (u64, CanonicalConversation);

pub struct Coordinator {
    bus: Arc<Bus>,
    reply_timeout: Duration,
    latest: HashMap<u64, CanonicalConversation>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Coordinator {
    pub fn new(bus: Arc<Bus>, settings: &CaptureSettings) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            bus,
            reply_timeout: settings.reply_timeout(),
            latest: HashMap::new(),
            completions_tx,
            completions_rx,
        }
    }

    /// Latest conversation captured in `tab`.
    pub fn latest(&self, tab_id: u64) -> Option<&CanonicalConversation> {
        self.latest.get(&tab_id)
    }

    fn store(&mut self, tab_id: u64, conversation: CanonicalConversation) {
        let unchanged = self
            .latest
            .get(&tab_id)
            .is_some_and(|prev| prev.fingerprint() == conversation.fingerprint());
        if unchanged {
            debug!(tab = tab_id, "Re-capture of an unchanged conversation");
        }
        self.latest.insert(tab_id, conversation);
    }

    /// Drop everything held for a tab whose page went away.
    fn forget(&mut self, tab_id: u64) {
        if self.latest.remove(&tab_id).is_some() {
            debug!(tab = tab_id, "Released conversation of closed page");
        }
    }

    fn forward_to_preview(&self, envelope: Envelope) {
        if let Err(e) = self.bus.post(ContextId::Background, ContextId::Preview, envelope) {
            debug!("Preview not reachable: {}", e);
        }
    }

    fn handle_delivery(&mut self, delivery: Delivery) {
        let Delivery {
            from,
            envelope,
            responder,
        } = delivery;

        match envelope.action {
            Action::ContentReady => self.on_content_ready(from, envelope, responder),
            Action::ContentFailed => {
                warn!(%from, "Capture failed: {}", envelope.error.as_deref().unwrap_or("unknown error"));
                self.forward_to_preview(envelope);
                responder.acknowledge();
            }
            Action::ExportRequest => self.relay_export_request(envelope, responder),
            Action::Ping => responder.respond(envelope.reply(Action::Ping)),
            Action::PageClosed => {
                match (from, envelope.context.tab_id) {
                    (ContextId::Page(tab), _) | (_, Some(tab)) => self.forget(tab),
                    _ => debug!(%from, "page-closed without a tab"),
                }
                responder.acknowledge();
            }
            Action::Unknown => debug!(%from, "Ignoring unknown action"),
        }
    }

    fn on_content_ready(&mut self, from: ContextId, envelope: Envelope, responder: Responder) {
        let tab_id = match (from, envelope.context.tab_id) {
            (ContextId::Page(tab), _) => tab,
            (_, Some(tab)) => tab,
            _ => {
                responder.reject("content-ready without a tab");
                return;
            }
        };

        let Some(payload) = envelope.data.clone() else {
            responder.reject("content-ready without data");
            return;
        };

        match payload.into_canonical() {
            Ok(conversation) => {
                info!(
                    tab = tab_id,
                    "Stored {} messages: {}",
                    conversation.message_count(),
                    conversation.title
                );
                self.store(tab_id, conversation);
                self.forward_to_preview(envelope);
                responder.acknowledge();
            }
            Err(e) => {
                warn!(tab = tab_id, "Rejecting malformed payload: {}", e);
                responder.reject(e.to_string());
            }
        }
    }

    fn relay_export_request(&self, envelope: Envelope, responder: Responder) {
        let context = envelope.context;
        let Some(tab_id) = context.tab_id else {
            responder.respond(Envelope::content_failed(context, "export-request without tabId"));
            return;
        };

        let pending = self
            .bus
            .send(ContextId::Background, ContextId::Page(tab_id), envelope);
        let limit = self.reply_timeout;
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let reply = match pending.wait_timeout(limit).await {
                Ok(Some(reply)) => reply,
                Ok(None) => Envelope::content_failed(context, "page acknowledged without content"),
                Err(e) => {
                    warn!(tab = tab_id, "Export request not delivered: {}", e);
                    Envelope::content_failed(context, e.to_string())
                }
            };

            if let Some(payload) = reply.data.clone() {
                if let Ok(conversation) = payload.into_canonical() {
                    let _ = completions.send((tab_id, conversation));
                }
            }
            responder.respond(reply);
        });
    }

    /// Event loop of the background context.
    pub async fn run(mut self, mut inbox: Inbox) {
        info!("Background coordinator started");
        loop {
            tokio::select! {
                delivery = inbox.recv() => match delivery {
                    Some(delivery) => self.handle_delivery(delivery),
                    None => break,
                },
                Some((tab_id, conversation)) = self.completions_rx.recv() => {
                    if self.bus.is_registered(ContextId::Page(tab_id)) {
                        self.store(tab_id, conversation);
                    } else {
                        debug!(tab = tab_id, "Page closed before its export completed");
                    }
                }
            }
        }
        info!("Background coordinator stopped");
    }

    /// Register as the background context and run on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        let inbox = self.bus.register(ContextId::Background);
        tokio::spawn(self.run(inbox))
    }
}
