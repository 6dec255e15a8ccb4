//! In-memory browser used by the integration tests.

#![allow(dead_code)]

use enquiry::{BrowserEngine, EnquiryError};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MockState {
    pub elements: HashMap<String, String>,
    pub tables: HashMap<String, Vec<Vec<String>>>,
    pub frames: HashSet<String>,
    pub named_frames: HashSet<String>,
    pub current_frame: Option<String>,
    pub frame_history: Vec<String>,
    pub visited: Vec<String>,
    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub windows: Vec<(String, String)>,
    pub current_window: String,
    pub popup: Option<(u32, String)>,
    pub window_polls: u32,
    pub quit: bool,
}

pub struct MockEngine {
    state: Mutex<MockState>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        let state = MockState {
            windows: vec![("main".to_string(), "Login".to_string())],
            current_window: "main".to_string(),
            ..MockState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_element(self, css: &str, text: &str) -> Self {
        self.state().elements.insert(css.to_string(), text.to_string());
        self
    }

    pub fn with_table(self, rows_css: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.state().tables.insert(rows_css.to_string(), rows);
        self
    }

    pub fn with_frame(self, css: &str) -> Self {
        self.state().frames.insert(css.to_string());
        self
    }

    pub fn with_named_frame(self, name: &str) -> Self {
        self.state().named_frames.insert(name.to_string());
        self
    }

    /// A second window titled `title` opens on the `polls`-th window listing.
    pub fn with_popup_after(self, polls: u32, title: &str) -> Self {
        self.state().popup = Some((polls, title.to_string()));
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

fn not_found(css: &str) -> EnquiryError {
    EnquiryError::ElementNotFound(css.to_string())
}

#[async_trait::async_trait]
impl BrowserEngine for MockEngine {
    async fn goto(&self, url: &str) -> Result<(), EnquiryError> {
        self.state().visited.push(url.to_string());
        Ok(())
    }

    async fn title(&self) -> Result<String, EnquiryError> {
        let state = self.state();
        Ok(state
            .windows
            .iter()
            .find(|(handle, _)| *handle == state.current_window)
            .map(|(_, title)| title.clone())
            .unwrap_or_default())
    }

    async fn click(&self, css: &str) -> Result<(), EnquiryError> {
        let mut state = self.state();
        if !state.elements.contains_key(css) {
            return Err(not_found(css));
        }
        state.clicks.push(css.to_string());
        Ok(())
    }

    async fn clear_and_type(&self, css: &str, text: &str) -> Result<(), EnquiryError> {
        let mut state = self.state();
        if !state.elements.contains_key(css) {
            return Err(not_found(css));
        }
        state.typed.push((css.to_string(), text.to_string()));
        Ok(())
    }

    async fn text(&self, css: &str) -> Result<String, EnquiryError> {
        self.state()
            .elements
            .get(css)
            .cloned()
            .ok_or_else(|| not_found(css))
    }

    async fn exists(&self, css: &str) -> Result<bool, EnquiryError> {
        let state = self.state();
        Ok(state.elements.contains_key(css) || state.frames.contains(css))
    }

    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<(), EnquiryError> {
        if self.exists(css).await? {
            Ok(())
        } else {
            Err(EnquiryError::Timeout(format!(
                "Timed out after {timeout:?} waiting for element {css:?}"
            )))
        }
    }

    async fn table_rows(&self, rows_css: &str) -> Result<Vec<Vec<String>>, EnquiryError> {
        Ok(self.state().tables.get(rows_css).cloned().unwrap_or_default())
    }

    async fn switch_to_frame(&self, css: &str) -> Result<(), EnquiryError> {
        let mut state = self.state();
        if !state.frames.contains(css) {
            return Err(not_found(css));
        }
        state.current_frame = Some(css.to_string());
        state.frame_history.push(css.to_string());
        Ok(())
    }

    async fn wait_for_frame_by_name(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(), EnquiryError> {
        let mut state = self.state();
        if !state.named_frames.contains(name) {
            return Err(EnquiryError::Timeout(format!(
                "Timed out after {timeout:?} waiting for frame '{name}'"
            )));
        }
        state.current_frame = Some(name.to_string());
        state.frame_history.push(name.to_string());
        Ok(())
    }

    async fn switch_to_default(&self) -> Result<(), EnquiryError> {
        let mut state = self.state();
        state.current_frame = None;
        state.frame_history.push("<default>".to_string());
        Ok(())
    }

    async fn current_window(&self) -> Result<String, EnquiryError> {
        Ok(self.state().current_window.clone())
    }

    async fn windows(&self) -> Result<Vec<String>, EnquiryError> {
        let mut state = self.state();
        state.window_polls += 1;
        if let Some((after, title)) = state.popup.clone() {
            if state.window_polls >= after && state.windows.len() == 1 {
                state.windows.push(("popup".to_string(), title));
            }
        }
        Ok(state.windows.iter().map(|(handle, _)| handle.clone()).collect())
    }

    async fn switch_to_window(&self, handle: &str) -> Result<(), EnquiryError> {
        let mut state = self.state();
        if !state.windows.iter().any(|(h, _)| h == handle) {
            return Err(not_found(handle));
        }
        state.current_window = handle.to_string();
        Ok(())
    }

    async fn quit(&self) -> Result<(), EnquiryError> {
        self.state().quit = true;
        Ok(())
    }
}
