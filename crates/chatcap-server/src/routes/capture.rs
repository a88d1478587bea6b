//! Capture routes: run a page snapshot through the page, background and
//! preview contexts.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chatcap_bus::ContextId;
use chatcap_core::Error;
use chatcap_runtime::NO_CONVERSATION;
use serde::Deserialize;
use tracing::warn;

use crate::state::{AppState, CaptureOutcome};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(ping))
        .route("/capture", post(capture))
        .route("/conversations/latest", get(latest_conversation))
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub html: String,
}

/// GET /api/ping: liveness of the server and its contexts.
async fn ping(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
        "background": state.bus.is_registered(ContextId::Background),
        "preview": state.bus.is_registered(ContextId::Preview),
    }))
}

/// POST /api/capture: capture one page snapshot.
async fn capture(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CaptureRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let title = req.title.unwrap_or_default();
    match state.capture(&req.url, &title, &req.html).await {
        Ok(CaptureOutcome::Captured(conversation)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "captured",
                "contentHash": conversation.fingerprint(),
                "preview": state.preview.render_preview(),
                "conversation": conversation,
            })),
        ),
        Ok(CaptureOutcome::Empty) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "status": "empty",
                "error": NO_CONVERSATION,
            })),
        ),
        Err(e @ Error::UnsupportedPlatform(_)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
        Err(e) => {
            warn!("Capture of {} failed: {}", req.url, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}

/// GET /api/conversations/latest: what the preview surface currently holds.
async fn latest_conversation(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.preview.latest() {
        Some(conversation) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "conversation": conversation,
                "preview": state.preview.render_preview(),
                "lastError": state.preview.last_error(),
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "No conversation captured yet",
                "lastError": state.preview.last_error(),
            })),
        ),
    }
}
