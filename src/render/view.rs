//! The two sinks a submission writes to: a status line and a report panel.
//!
//! Both are passed explicitly to the handler and renderer, so a report can be
//! produced and inspected without any surrounding page.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

#[derive(Debug, Default)]
struct StatusState {
    text: String,
    history: Vec<String>,
}

/// Single line of user-facing status text.
#[derive(Debug, Default)]
pub struct StatusLine {
    state: Mutex<StatusState>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, text: impl Into<String>) {
        let text = text.into();
        debug!(status = %text, "status updated");
        let mut state = self.lock();
        state.history.push(text.clone());
        state.text = text;
    }

    pub fn clear(&self) {
        self.set(String::new());
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Every value the line has held, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }
}

/// Container of rendered card markup.
#[derive(Debug, Default)]
pub struct ReportPanel {
    cards: Mutex<Vec<String>>,
}

impl ReportPanel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.cards.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn append(&self, markup: String) {
        self.lock().push(markup);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn cards(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Concatenated inner markup of the panel.
    pub fn html(&self) -> String {
        self.lock().concat()
    }
}
