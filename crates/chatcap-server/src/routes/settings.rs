//! Capture settings routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    #[serde(rename = "pollIntervalMs")]
    pub poll_interval_ms: Option<u64>,
    #[serde(rename = "settleDelayMs")]
    pub settle_delay_ms: Option<u64>,
    #[serde(rename = "replyTimeoutMs")]
    pub reply_timeout_ms: Option<u64>,
    #[serde(rename = "extraDenylist")]
    pub extra_denylist: Option<Vec<String>>,
}

/// GET /api/settings
async fn get_settings(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!(*state.capture_settings.read()))
}

/// PUT /api/settings: applies to captures started afterwards.
async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> (StatusCode, Json<serde_json::Value>) {
    let updated = {
        let mut settings = state.capture_settings.write();
        if let Some(v) = update.poll_interval_ms {
            settings.poll_interval_ms = v;
        }
        if let Some(v) = update.settle_delay_ms {
            settings.settle_delay_ms = v;
        }
        if let Some(v) = update.reply_timeout_ms {
            settings.reply_timeout_ms = v;
        }
        if let Some(v) = update.extra_denylist {
            settings.extra_denylist = v;
        }
        settings.clone()
    };

    match updated.save() {
        Ok(()) => {
            info!("Capture settings saved to {}", updated.settings_path.display());
            (StatusCode::OK, Json(serde_json::json!(updated)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}
