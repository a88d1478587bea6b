//! Response shapes of the HTTP API, exercised through the router without a
//! listening socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chatcap_core::ChatcapConfig;
use chatcap_server::{build_router, AppState};
use tower::ServiceExt;

const CHATGPT_URL: &str = "https://chatgpt.com/c/7f3e";

const CHATGPT_PAGE: &str = r#"<html><head><title>Binary search - ChatGPT</title></head><body><main>
    <article data-testid="conversation-turn-1">
      <div data-message-author-role="user"><div class="whitespace-pre-wrap">How does binary search work?</div></div>
    </article>
    <article data-testid="conversation-turn-2">
      <div data-message-author-role="assistant">
        <div class="markdown prose"><p>Halve the range each step.</p><pre><code>while lo &lt; hi { }</code></pre></div>
        <button data-testid="copy-turn-action-button"><svg></svg></button>
      </div>
    </article>
</main></body></html>"#;

struct Harness {
    state: Arc<AppState>,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = ChatcapConfig::from_env(dir.path()).unwrap();
    Harness {
        state: Arc::new(AppState::new(config)),
        _dir: dir,
    }
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, String, Option<String>) {
    let response = build_router(Arc::clone(state)).oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, String, Option<String>) {
    send(state, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(
    state: &Arc<AppState>,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, text, _) = send(state, request).await;
    (status, serde_json::from_str(&text).unwrap())
}

async fn capture_fixture(state: &Arc<AppState>) -> (StatusCode, serde_json::Value) {
    post_json(
        state,
        "/api/capture",
        serde_json::json!({
            "url": CHATGPT_URL,
            "title": "Binary search - ChatGPT",
            "html": CHATGPT_PAGE,
        }),
    )
    .await
}

#[tokio::test]
async fn test_ping_shape() {
    let h = harness();
    let (status, body, _) = get(&h.state, "/api/ping").await;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["ok"], true);
    assert!(value["version"].is_string());
    assert_eq!(value["background"], true);
    assert_eq!(value["preview"], true);
}

#[tokio::test]
async fn test_capture_shape() {
    let h = harness();
    let (status, value) = capture_fixture(&h.state).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "captured");
    assert!(value["contentHash"].is_string());
    assert!(value["preview"].as_str().unwrap().starts_with("Binary search - ChatGPT"));

    let conversation = &value["conversation"];
    assert_eq!(conversation["title"], "Binary search - ChatGPT");
    assert_eq!(conversation["sourcePlatform"], "chatgpt");
    assert!(conversation["capturedAt"].is_string());
    let messages = conversation["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    let markup = messages[1]["content"]["markup"].as_str().unwrap();
    assert!(markup.contains("<pre><code>"));
    assert!(!markup.contains("svg"));
}

#[tokio::test]
async fn test_capture_empty_and_unsupported() {
    let h = harness();
    let (status, value) = post_json(
        &h.state,
        "/api/capture",
        serde_json::json!({ "url": CHATGPT_URL, "html": "<main><h1>What can I help with?</h1></main>" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["status"], "empty");
    assert_eq!(value["error"], "No conversation found");

    let (status, value) = post_json(
        &h.state,
        "/api/capture",
        serde_json::json!({ "url": "https://example.com/chat", "html": CHATGPT_PAGE }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(value["error"].as_str().unwrap().contains("example.com"));
}

#[tokio::test]
async fn test_latest_and_exports() {
    let h = harness();
    let (status, _, _) = get(&h.state, "/api/conversations/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = get(&h.state, "/api/export/latest/json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    capture_fixture(&h.state).await;

    let (status, body, _) = get(&h.state, "/api/conversations/latest").await;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["conversation"]["messages"].as_array().unwrap().len(), 2);
    assert!(value["lastError"].is_null());

    let (status, body, content_type) = get(&h.state, "/api/export/latest/json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let parsed = chatcap_export::parse_json(&body).unwrap();
    assert_eq!(parsed.message_count(), 2);

    let (status, body, content_type) = get(&h.state, "/api/export/latest/markdown").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/markdown"));
    assert!(body.starts_with("# Binary search - ChatGPT\n"));
    assert!(body.contains("### Assistant\n\nHalve the range each step."));

    let (status, _, _) = get(&h.state, "/api/export/latest/pdf").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, value) = post_json(&h.state, "/api/export/latest", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["totalMessages"], 2);
    let json_path = value["json"].as_str().unwrap();
    assert!(json_path.ends_with(".json"));
    assert!(std::path::Path::new(json_path).exists());
}

#[tokio::test]
async fn test_settings_update_persists() {
    let h = harness();
    let (status, body, _) = get(&h.state, "/api/settings").await;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["pollIntervalMs"], 1000);
    assert_eq!(value["settleDelayMs"], 500);

    let request = Request::put("/api/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"extraDenylist":[".citation"]}"#))
        .unwrap();
    let (status, body, _) = send(&h.state, request).await;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["extraDenylist"], serde_json::json!([".citation"]));
    assert_eq!(value["replyTimeoutMs"], 5000);
    assert!(h.state.config.data_paths.settings_file.exists());
}
