use crate::errors::EnquiryError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod webdriver;

pub use webdriver::WebDriverEngine;

/// Browsers a WebDriver server can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Edge,
    Chrome,
    Firefox,
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Browser::Edge => "edge",
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Browser {
    type Err = EnquiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "edge" | "msedge" => Ok(Browser::Edge),
            "chrome" | "chromium" => Ok(Browser::Chrome),
            "firefox" | "gecko" => Ok(Browser::Firefox),
            other => Err(EnquiryError::InvalidArgument(format!(
                "Unsupported browser '{other}'. Use edge, chrome or firefox."
            ))),
        }
    }
}

/// Where the WebDriver server listens and which browser it should start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub webdriver_url: String,
    pub browser: Browser,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            browser: Browser::Edge,
        }
    }
}

/// The browser capabilities the workflow runner and scraper depend on.
///
/// Element-addressing methods take CSS selectors and act inside the frame
/// the session is currently switched to.
#[async_trait::async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Navigate the current window to a URL
    async fn goto(&self, url: &str) -> Result<(), EnquiryError>;

    /// Title of the current window
    async fn title(&self) -> Result<String, EnquiryError>;

    async fn click(&self, css: &str) -> Result<(), EnquiryError>;

    /// Clear an input element, then type `text` into it
    async fn clear_and_type(&self, css: &str, text: &str) -> Result<(), EnquiryError>;

    /// Visible text of the first matching element
    async fn text(&self, css: &str) -> Result<String, EnquiryError>;

    /// Whether at least one element matches, without waiting
    async fn exists(&self, css: &str) -> Result<bool, EnquiryError>;

    /// Wait until an element is present; `Timeout` when it never appears
    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<(), EnquiryError>;

    /// Texts of the `td` cells of every row matching `rows_css`
    async fn table_rows(&self, rows_css: &str) -> Result<Vec<Vec<String>>, EnquiryError>;

    /// Enter the frame element matched by `css`
    async fn switch_to_frame(&self, css: &str) -> Result<(), EnquiryError>;

    /// Wait for a frame with the given `name` attribute and enter it
    async fn wait_for_frame_by_name(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(), EnquiryError>;

    /// Return to the top-level document
    async fn switch_to_default(&self) -> Result<(), EnquiryError>;

    async fn current_window(&self) -> Result<String, EnquiryError>;

    async fn windows(&self) -> Result<Vec<String>, EnquiryError>;

    async fn switch_to_window(&self, handle: &str) -> Result<(), EnquiryError>;

    /// End the browser session
    async fn quit(&self) -> Result<(), EnquiryError>;
}

/// Connect to the configured WebDriver server
pub async fn create_engine(config: &EngineConfig) -> Result<Arc<dyn BrowserEngine>, EnquiryError> {
    Ok(Arc::new(WebDriverEngine::connect(config).await?))
}
