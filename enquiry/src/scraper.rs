//! An operator-driven enquiry session: open the app, wait for the enquiry
//! window the operator opens after logging in, then scrape its data table.

use crate::errors::EnquiryError;
use crate::platforms::{create_engine, BrowserEngine, EngineConfig};
use crate::presets::{FieldDef, Presets};
use crate::runner::{lookup_table_value, RunReport, WorkflowRunner};
use crate::selector::{FieldSelector, PresetPath};
use crate::workflow::Workflow;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Placeholder written for a field whose table row was absent.
pub const NOT_FOUND: &str = "[NOT FOUND]";

/// How long to poll for the window opened after login
#[derive(Debug, Clone, Copy)]
pub struct WindowWatch {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for WindowWatch {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// `name` of the frame entered when the tab has no `iframe` selector
    pub frame_name: String,
    /// `id` of the table whose presence marks a loaded enquiry page
    pub data_table_id: String,
    pub frame_timeout: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            frame_name: "enqframe".to_string(),
            data_table_id: "info-table".to_string(),
            frame_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Found(String),
    NotFound,
    Error(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Found(text) => f.write_str(text),
            FieldValue::NotFound => f.write_str(NOT_FOUND),
            FieldValue::Error(msg) => write!(f, "[ERROR] {msg}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeReport {
    pub window_title: Option<String>,
    pub table_found: bool,
    pub values: IndexMap<String, FieldValue>,
}

impl ScrapeReport {
    /// Flattens the values into one spreadsheet row.
    pub fn to_record(&self) -> IndexMap<String, String> {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.values
            .values()
            .filter(|v| matches!(v, FieldValue::Error(_)))
            .count()
    }
}

/// Prefixes `https://` unless the URL already names a scheme we can open.
pub fn normalize_url(url: &str) -> Result<String, EnquiryError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(EnquiryError::InvalidArgument("URL is required.".to_string()));
    }
    let lower = url.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("file:")
    {
        Ok(url.to_string())
    } else {
        Ok(format!("https://{url}"))
    }
}

pub struct EnquirySession {
    engine: Arc<dyn BrowserEngine>,
}

impl EnquirySession {
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self { engine }
    }

    /// Starts a browser through the configured WebDriver server.
    pub async fn connect(config: &EngineConfig) -> Result<Self, EnquiryError> {
        Ok(Self::new(create_engine(config).await?))
    }

    pub fn engine(&self) -> &dyn BrowserEngine {
        self.engine.as_ref()
    }

    #[instrument(skip(self))]
    pub async fn open(&self, url: &str) -> Result<String, EnquiryError> {
        let url = normalize_url(url)?;
        self.engine.goto(&url).await?;
        info!("Opened: {url}");
        Ok(url)
    }

    /// Polls until a second window appears, switches to it and returns its title.
    #[instrument(skip(self))]
    pub async fn wait_for_new_window(
        &self,
        watch: WindowWatch,
    ) -> Result<Option<String>, EnquiryError> {
        let original = self.engine.current_window().await?;
        for attempt in 1..=watch.attempts {
            tokio::time::sleep(watch.interval).await;
            let handles = self.engine.windows().await?;
            debug!(attempt, windows = handles.len(), "Polling for enquiry window");
            if handles.len() <= 1 {
                continue;
            }
            if let Some(handle) = handles.iter().find(|h| **h != original) {
                self.engine.switch_to_window(handle).await?;
                let title = self.engine.title().await?;
                info!("Switched to window: {title}");
                return Ok(Some(title));
            }
        }
        warn!("No new window appeared after {} attempts", watch.attempts);
        Ok(None)
    }

    /// Scrapes the enabled fields of a preset tab.
    pub async fn scrape_preset(
        &self,
        presets: &Presets,
        path: &PresetPath,
        options: &ScrapeOptions,
    ) -> Result<ScrapeReport, EnquiryError> {
        if presets.fields(path).is_none() {
            return Err(EnquiryError::PresetNotFound(path.to_string()));
        }
        let fields = presets.scrape_fields(path);
        self.scrape(&fields, presets.frame_selector(path), options)
            .await
    }

    /// Enters the data frame and reads every field.
    ///
    /// Per-field failures are recorded in the report; only failing to reach
    /// the frame is an error.
    #[instrument(skip(self, fields, options), fields(fields = fields.len()))]
    pub async fn scrape(
        &self,
        fields: &[(&str, &FieldDef)],
        frame_selector: Option<&str>,
        options: &ScrapeOptions,
    ) -> Result<ScrapeReport, EnquiryError> {
        let mut report = ScrapeReport {
            window_title: self.engine.title().await.ok(),
            ..ScrapeReport::default()
        };

        match frame_selector {
            Some(css) => {
                self.engine.wait_for(css, options.frame_timeout).await?;
                self.engine.switch_to_frame(css).await?;
                info!("Switched to frame {css}.");
            }
            None => {
                self.engine
                    .wait_for_frame_by_name(&options.frame_name, options.frame_timeout)
                    .await?;
            }
        }

        let table_css = format!("#{}", options.data_table_id);
        if !self.engine.exists(&table_css).await? {
            warn!("No data table found.");
            return Ok(report);
        }
        info!("Info table found.");
        report.table_found = true;

        for (name, def) in fields {
            let value = match self.read_field(def).await {
                Ok(Some(text)) => {
                    debug!("{name}: {text}");
                    FieldValue::Found(text)
                }
                Ok(None) => {
                    debug!("{name}: {NOT_FOUND}");
                    FieldValue::NotFound
                }
                Err(e) => {
                    warn!("{name}: [ERROR] {e}");
                    FieldValue::Error(e.to_string())
                }
            };
            report.values.insert(name.to_string(), value);
        }
        Ok(report)
    }

    async fn read_field(&self, def: &FieldDef) -> Result<Option<String>, EnquiryError> {
        match &def.selector {
            FieldSelector::Css { selector } => {
                Ok(Some(self.engine.text(selector).await?.trim().to_string()))
            }
            FieldSelector::TableLookup { .. } => {
                lookup_table_value(self.engine.as_ref(), &def.selector).await
            }
        }
    }

    pub async fn run_workflow(
        &self,
        workflow: &Workflow,
        presets: &Presets,
        context: &HashMap<String, String>,
        default_path: Option<&PresetPath>,
    ) -> Result<RunReport, EnquiryError> {
        WorkflowRunner::new(self.engine.as_ref(), presets)
            .run(workflow, context, default_path)
            .await
    }

    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<(), EnquiryError> {
        self.engine.quit().await
    }
}
