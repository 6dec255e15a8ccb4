//! [`BrowserEngine`] backed by a WebDriver server through `thirtyfour`.

use super::{Browser, BrowserEngine, EngineConfig};
use crate::errors::EnquiryError;
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct WebDriverEngine {
    driver: RwLock<Option<WebDriver>>,
}

impl WebDriverEngine {
    #[instrument(skip(config), fields(url = %config.webdriver_url, browser = %config.browser))]
    pub async fn connect(config: &EngineConfig) -> Result<Self, EnquiryError> {
        let url = config.webdriver_url.as_str();
        let driver = match config.browser {
            Browser::Edge => WebDriver::new(url, DesiredCapabilities::edge()).await,
            Browser::Chrome => WebDriver::new(url, DesiredCapabilities::chrome()).await,
            Browser::Firefox => WebDriver::new(url, DesiredCapabilities::firefox()).await,
        }
        .map_err(|e| {
            EnquiryError::Browser(format!(
                "Failed to start a {} session at {url}: {e}",
                config.browser
            ))
        })?;
        info!("WebDriver session started");
        Ok(Self {
            driver: RwLock::new(Some(driver)),
        })
    }

    async fn element(driver: &WebDriver, css: &str) -> Result<WebElement, EnquiryError> {
        driver
            .find(By::Css(css))
            .await
            .map_err(|e| EnquiryError::ElementNotFound(format!("{css}: {e}")))
    }
}

// Every call borrows the live session; after `quit` the engine reports a closed session.
macro_rules! session {
    ($self:ident, $guard:ident) => {
        let $guard = $self.driver.read().await;
        let $guard = $guard
            .as_ref()
            .ok_or_else(|| EnquiryError::Browser("Browser session is closed".to_string()))?;
    };
}

#[async_trait::async_trait]
impl BrowserEngine for WebDriverEngine {
    #[instrument(skip(self))]
    async fn goto(&self, url: &str) -> Result<(), EnquiryError> {
        session!(self, driver);
        driver.goto(url).await?;
        Ok(())
    }

    async fn title(&self) -> Result<String, EnquiryError> {
        session!(self, driver);
        Ok(driver.title().await?)
    }

    async fn click(&self, css: &str) -> Result<(), EnquiryError> {
        session!(self, driver);
        Self::element(driver, css).await?.click().await?;
        Ok(())
    }

    async fn clear_and_type(&self, css: &str, text: &str) -> Result<(), EnquiryError> {
        session!(self, driver);
        let element = Self::element(driver, css).await?;
        element.clear().await?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn text(&self, css: &str) -> Result<String, EnquiryError> {
        session!(self, driver);
        Ok(Self::element(driver, css).await?.text().await?)
    }

    async fn exists(&self, css: &str) -> Result<bool, EnquiryError> {
        session!(self, driver);
        Ok(!driver.find_all(By::Css(css)).await?.is_empty())
    }

    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<(), EnquiryError> {
        session!(self, driver);
        driver
            .query(By::Css(css))
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await
            .map_err(|e| {
                EnquiryError::Timeout(format!(
                    "Timed out after {timeout:?} waiting for element {css:?}. Original error: {e}"
                ))
            })?;
        Ok(())
    }

    async fn table_rows(&self, rows_css: &str) -> Result<Vec<Vec<String>>, EnquiryError> {
        session!(self, driver);
        let mut rows = Vec::new();
        for row in driver.find_all(By::Css(rows_css)).await? {
            let mut cells = Vec::new();
            for cell in row.find_all(By::Tag("td")).await? {
                cells.push(cell.text().await?);
            }
            rows.push(cells);
        }
        debug!(rows = rows.len(), "Read table rows for {rows_css}");
        Ok(rows)
    }

    async fn switch_to_frame(&self, css: &str) -> Result<(), EnquiryError> {
        session!(self, driver);
        Self::element(driver, css).await?.enter_frame().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn wait_for_frame_by_name(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(), EnquiryError> {
        session!(self, driver);
        let frame = driver
            .query(By::Name(name))
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await
            .map_err(|e| {
                EnquiryError::Timeout(format!(
                    "Timed out after {timeout:?} waiting for frame '{name}'. Original error: {e}"
                ))
            })?;
        frame.enter_frame().await?;
        info!("Switched to '{name}'.");
        Ok(())
    }

    async fn switch_to_default(&self) -> Result<(), EnquiryError> {
        session!(self, driver);
        driver.enter_default_frame().await?;
        Ok(())
    }

    async fn current_window(&self) -> Result<String, EnquiryError> {
        session!(self, driver);
        Ok(driver.window().await?.to_string())
    }

    async fn windows(&self) -> Result<Vec<String>, EnquiryError> {
        session!(self, driver);
        Ok(driver
            .windows()
            .await?
            .into_iter()
            .map(|handle| handle.to_string())
            .collect())
    }

    async fn switch_to_window(&self, handle: &str) -> Result<(), EnquiryError> {
        session!(self, driver);
        let target = driver
            .windows()
            .await?
            .into_iter()
            .find(|h| h.to_string() == handle)
            .ok_or_else(|| EnquiryError::ElementNotFound(format!("window {handle}")))?;
        driver.switch_to_window(target).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn quit(&self) -> Result<(), EnquiryError> {
        if let Some(driver) = self.driver.write().await.take() {
            driver.quit().await?;
            info!("Browser closed.");
        }
        Ok(())
    }
}
