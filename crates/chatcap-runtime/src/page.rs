//! Page host seam.

use std::sync::Arc;

use parking_lot::Mutex;

/// Stable identifier of the injected export control.
pub const CONTROL_ID: &str = "chatcap-export-button";

/// What the page context needs from the page it lives in.
///
/// Implementations answer from the live document; the orchestrator never
/// mutates page content except through `insert_control`.
pub trait PageHost: Send + Sync {
    fn location(&self) -> String;

    fn title(&self) -> String;

    /// Serialized document, parsed fresh on every extraction.
    fn document_html(&self) -> String;

    fn has_control(&self, id: &str) -> bool;

    fn insert_control(&self, id: &str);

    /// Show a short message to the user.
    fn notify(&self, message: &str);
}

#[derive(Debug, Default)]
struct SnapshotState {
    url: String,
    title: String,
    html: String,
    controls: Vec<String>,
    notices: Vec<String>,
}

/// A page backed by a captured HTML snapshot.
///
/// Clones share the same page, so a test or server handler can keep one
/// clone to drive navigation while the context owns another.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPage {
    inner: Arc<Mutex<SnapshotState>>,
}

impl SnapshotPage {
    pub fn new(url: impl Into<String>, title: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SnapshotState {
                url: url.into(),
                title: title.into(),
                html: html.into(),
                ..Default::default()
            })),
        }
    }

    /// Client-side route change: new document, injected controls are lost.
    pub fn navigate(&self, url: impl Into<String>, title: impl Into<String>, html: impl Into<String>) {
        let mut state = self.inner.lock();
        state.url = url.into();
        state.title = title.into();
        state.html = html.into();
        state.controls.clear();
    }

    /// How many times `id` is present in the page.
    pub fn control_count(&self, id: &str) -> usize {
        self.inner.lock().controls.iter().filter(|c| *c == id).count()
    }

    pub fn notices(&self) -> Vec<String> {
        self.inner.lock().notices.clone()
    }
}

impl PageHost for SnapshotPage {
    fn location(&self) -> String {
        self.inner.lock().url.clone()
    }

    fn title(&self) -> String {
        self.inner.lock().title.clone()
    }

    fn document_html(&self) -> String {
        self.inner.lock().html.clone()
    }

    fn has_control(&self, id: &str) -> bool {
        self.inner.lock().controls.iter().any(|c| c == id)
    }

    fn insert_control(&self, id: &str) {
        self.inner.lock().controls.push(id.to_string());
    }

    fn notify(&self, message: &str) {
        self.inner.lock().notices.push(message.to_string());
    }
}
