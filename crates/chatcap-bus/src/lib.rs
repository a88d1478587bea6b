//! chatcap bus: asynchronous envelope delivery between isolated contexts.
//!
//! The page script, the background coordinator and the preview surface share
//! no memory. They exchange [`Envelope`]s through a [`Bus`]: each context
//! registers once and drains its [`Inbox`]; senders get a [`PendingReply`]
//! they may await, time out, or simply drop.

pub mod bus;
pub mod envelope;

pub use bus::{Bus, ContextId, Delivery, DeliveryError, Inbox, PendingReply, Reply, Responder};
pub use envelope::{Action, ConversationPayload, CorrelationContext, Envelope, PayloadMessage};
