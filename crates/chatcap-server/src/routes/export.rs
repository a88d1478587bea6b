//! Export routes: download or save the latest capture.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tracing::error;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/export/latest", post(save_latest))
        .route("/export/latest/{format}", get(download_latest))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// GET /api/export/latest/{format}: `json` or `markdown` download.
async fn download_latest(
    State(state): State<Arc<AppState>>,
    Path(format): Path<String>,
) -> Response {
    let Some(conversation) = state.preview.latest() else {
        return error_response(StatusCode::NOT_FOUND, "No conversation captured yet");
    };

    let exported_at = Utc::now();
    let stem = chatcap_export::file_stem(&conversation.title, exported_at);

    let (body, content_type, extension) = match format.as_str() {
        "json" => match chatcap_export::to_json(&conversation, exported_at) {
            Ok(json) => (json, "application/json", "json"),
            Err(e) => {
                error!("JSON export failed: {}", e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        },
        "markdown" | "md" => (
            chatcap_export::to_markdown(&conversation, exported_at),
            "text/markdown; charset=utf-8",
            "md",
        ),
        other => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Unknown export format: {}", other),
            )
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.{}\"", stem, extension),
            ),
        ],
        body,
    )
        .into_response()
}

/// POST /api/export/latest: write both export files to the data directory.
async fn save_latest(State(state): State<Arc<AppState>>) -> Response {
    let Some(conversation) = state.preview.latest() else {
        return error_response(StatusCode::NOT_FOUND, "No conversation captured yet");
    };

    let dir = &state.config.data_paths.exports;
    match chatcap_export::write_exports(dir, &conversation, Utc::now()) {
        Ok(paths) => Json(serde_json::json!({
            "json": paths.json.to_string_lossy(),
            "markdown": paths.markdown.to_string_lossy(),
            "totalMessages": conversation.message_count(),
        }))
        .into_response(),
        Err(e) => {
            error!("Saving export failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
