//! chatcap server: HTTP surface and shared state behind the `chatcap` binary.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::{AppState, CaptureOutcome};
