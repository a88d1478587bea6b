//! In-process envelope bus between isolated contexts.
//!
//! Each context registers once and receives [`Delivery`] values on its
//! [`Inbox`]. A delivery carries a [`Responder`]: the recipient answers
//! through it, possibly long after its handler returned, or drops it, which
//! the sender observes as [`DeliveryError::Dropped`]. Callers own their
//! timeouts; nothing is retried.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::envelope::Envelope;

/// Address of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextId {
    /// Content context of one page, keyed by tab.
    Page(u64),
    Background,
    Preview,
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Page(tab) => write!(f, "page:{}", tab),
            Self::Background => write!(f, "background"),
            Self::Preview => write!(f, "preview"),
        }
    }
}

/// Why a send produced no remote answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("no receiver registered for {0}")]
    NoReceiver(ContextId),

    #[error("connection to {0} is closed")]
    Disconnected(ContextId),

    #[error("recipient dropped the request without answering")]
    Dropped,

    #[error("recipient rejected the request: {0}")]
    Rejected(String),

    #[error("no reply within {0:?}")]
    TimedOut(Duration),
}

impl From<DeliveryError> for chatcap_core::Error {
    fn from(e: DeliveryError) -> Self {
        chatcap_core::Error::Delivery(e.to_string())
    }
}

/// Outcome of a send: a reply envelope, a bare acknowledgement, or a failure.
pub type Reply = Result<Option<Envelope>, DeliveryError>;

/// An envelope handed to a recipient, with the means to answer it.
#[derive(Debug)]
pub struct Delivery {
    pub from: ContextId,
    pub envelope: Envelope,
    pub responder: Responder,
}

/// Deferred-completion handle for one delivery. Consumed by answering.
#[derive(Debug)]
pub struct Responder {
    correlation_id: Uuid,
    tx: oneshot::Sender<Reply>,
}

impl Responder {
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// True once the sender stopped waiting (timed out or went away).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn respond(self, envelope: Envelope) {
        self.complete(Ok(Some(envelope)));
    }

    pub fn acknowledge(self) {
        self.complete(Ok(None));
    }

    pub fn reject(self, reason: impl Into<String>) {
        self.complete(Err(DeliveryError::Rejected(reason.into())));
    }

    fn complete(self, reply: Reply) {
        if self.tx.send(reply).is_err() {
            debug!("Late reply for {} ignored", self.correlation_id);
        }
    }
}

/// Receiving side of a send.
#[derive(Debug)]
pub struct PendingReply {
    state: PendingState,
}

#[derive(Debug)]
enum PendingState {
    Waiting(oneshot::Receiver<Reply>),
    Failed(DeliveryError),
}

impl PendingReply {
    fn failed(err: DeliveryError) -> Self {
        Self {
            state: PendingState::Failed(err),
        }
    }

    /// Wait for the recipient to answer or drop the request.
    pub async fn wait(self) -> Reply {
        match self.state {
            PendingState::Failed(err) => Err(err),
            PendingState::Waiting(rx) => rx.await.unwrap_or(Err(DeliveryError::Dropped)),
        }
    }

    /// Like [`wait`](Self::wait), giving up after `limit`.
    pub async fn wait_timeout(self, limit: Duration) -> Reply {
        match tokio::time::timeout(limit, self.wait()).await {
            Ok(reply) => reply,
            Err(_) => Err(DeliveryError::TimedOut(limit)),
        }
    }
}

/// A context's queue of incoming deliveries.
#[derive(Debug)]
pub struct Inbox {
    id: ContextId,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Inbox {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }
}

/// Routing table shared by all contexts.
#[derive(Debug, Default)]
pub struct Bus {
    routes: RwLock<HashMap<ContextId, mpsc::UnboundedSender<Delivery>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`, replacing any previous registration.
    pub fn register(&self, id: ContextId) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.routes.write().insert(id, tx).is_some() {
            debug!("Context {} re-registered", id);
        }
        Inbox { id, rx }
    }

    pub fn unregister(&self, id: ContextId) {
        if self.routes.write().remove(&id).is_some() {
            debug!("Context {} unregistered", id);
        }
    }

    pub fn is_registered(&self, id: ContextId) -> bool {
        self.routes
            .read()
            .get(&id)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver `envelope` to `to`. The returned handle resolves once.
    pub fn send(&self, from: ContextId, to: ContextId, envelope: Envelope) -> PendingReply {
        let sender = self.routes.read().get(&to).cloned();
        let Some(sender) = sender else {
            debug!("{} -> {}: no receiver for {:?}", from, to, envelope.action);
            return PendingReply::failed(DeliveryError::NoReceiver(to));
        };

        let (tx, rx) = oneshot::channel();
        let delivery = Delivery {
            from,
            responder: Responder {
                correlation_id: envelope.context.id,
                tx,
            },
            envelope,
        };

        if sender.send(delivery).is_err() {
            warn!("{} -> {}: receiver gone, dropping route", from, to);
            self.routes.write().remove(&to);
            return PendingReply::failed(DeliveryError::Disconnected(to));
        }

        PendingReply {
            state: PendingState::Waiting(rx),
        }
    }

    /// Fire-and-forget delivery; only routing failures are reported.
    pub fn post(&self, from: ContextId, to: ContextId, envelope: Envelope) -> Result<(), DeliveryError> {
        match self.send(from, to, envelope).state {
            PendingState::Failed(err) => Err(err),
            PendingState::Waiting(_) => Ok(()),
        }
    }

    /// Send and hand the outcome to `on_result` exactly once, from a spawned task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn send_with<F>(
        &self,
        from: ContextId,
        to: ContextId,
        envelope: Envelope,
        timeout: Option<Duration>,
        on_result: F,
    ) where
        F: FnOnce(Reply) + Send + 'static,
    {
        let pending = self.send(from, to, envelope);
        tokio::spawn(async move {
            let reply = match timeout {
                Some(limit) => pending.wait_timeout(limit).await,
                None => pending.wait().await,
            };
            on_result(reply);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Action;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_request_response() {
        let bus = Arc::new(Bus::new());
        let mut inbox = bus.register(ContextId::Background);

        let request = Envelope::ping();
        let id = request.context.id;
        let pending = bus.send(ContextId::Preview, ContextId::Background, request);

        let delivery = inbox.recv().await.unwrap();
        assert_eq!(delivery.from, ContextId::Preview);
        assert_eq!(delivery.responder.correlation_id(), id);
        let reply = delivery.envelope.reply(Action::Ping);
        delivery.responder.respond(reply);

        let answer = pending.wait().await.unwrap().unwrap();
        assert_eq!(answer.action, Action::Ping);
        assert_eq!(answer.context.id, id);
    }

    #[tokio::test]
    async fn test_missing_receiver() {
        let bus = Bus::new();
        let reply = bus
            .send(ContextId::Preview, ContextId::Page(9), Envelope::export_request(9))
            .wait()
            .await;
        assert_eq!(reply, Err(DeliveryError::NoReceiver(ContextId::Page(9))));
        assert!(bus.post(ContextId::Preview, ContextId::Background, Envelope::ping()).is_err());
    }

    #[tokio::test]
    async fn test_closed_inbox_is_disconnected() {
        let bus = Bus::new();
        let inbox = bus.register(ContextId::Page(1));
        drop(inbox);
        assert!(!bus.is_registered(ContextId::Page(1)));

        let reply = bus
            .send(ContextId::Background, ContextId::Page(1), Envelope::ping())
            .wait()
            .await;
        assert_eq!(reply, Err(DeliveryError::Disconnected(ContextId::Page(1))));
    }

    #[tokio::test]
    async fn test_dropped_responder() {
        let bus = Bus::new();
        let mut inbox = bus.register(ContextId::Background);
        let pending = bus.send(ContextId::Page(1), ContextId::Background, Envelope::ping());
        drop(inbox.recv().await.unwrap());
        assert_eq!(pending.wait().await, Err(DeliveryError::Dropped));
    }

    #[tokio::test]
    async fn test_deferred_completion_from_another_task() {
        let bus = Bus::new();
        let mut inbox = bus.register(ContextId::Background);
        let pending = bus.send(ContextId::Preview, ContextId::Background, Envelope::export_request(4));

        let delivery = inbox.recv().await.unwrap();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            delivery.responder.reject("page went away");
        });

        assert_eq!(
            pending.wait().await,
            Err(DeliveryError::Rejected("page went away".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_timeout_and_late_reply() {
        let bus = Bus::new();
        let mut inbox = bus.register(ContextId::Page(2));
        let pending = bus.send(ContextId::Background, ContextId::Page(2), Envelope::ping());

        let limit = Duration::from_millis(250);
        assert_eq!(
            pending.wait_timeout(limit).await,
            Err(DeliveryError::TimedOut(limit))
        );

        let delivery = inbox.recv().await.unwrap();
        assert!(delivery.responder.is_closed());
        delivery.responder.acknowledge();
    }

    #[tokio::test]
    async fn test_send_with_calls_back_once() {
        let bus = Bus::new();
        let mut inbox = bus.register(ContextId::Background);
        let (tx, rx) = oneshot::channel();

        bus.send_with(
            ContextId::Page(3),
            ContextId::Background,
            Envelope::ping(),
            Some(Duration::from_secs(5)),
            move |reply| {
                let _ = tx.send(reply);
            },
        );

        inbox.recv().await.unwrap().responder.acknowledge();
        assert_eq!(rx.await.unwrap(), Ok(None));
    }
}
