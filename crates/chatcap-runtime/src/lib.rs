//! Runtime contexts: the page orchestrator, the background coordinator and
//! the preview surface, wired together only through the envelope bus.
//!
//! Each context runs as its own task and owns its state outright; the
//! [`PageHost`] trait is the seam to whatever renders the chat page.

pub mod coordinator;
pub mod orchestrator;
pub mod page;
pub mod preview;
pub mod types;

pub use coordinator::Coordinator;
pub use orchestrator::{capture_document, PageContext, PageHandle, NO_CONVERSATION};
pub use page::{PageHost, SnapshotPage, CONTROL_ID};
pub use preview::PreviewSurface;
pub use types::*;
