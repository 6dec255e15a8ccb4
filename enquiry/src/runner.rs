//! Executes workflow steps against a browser session.

use crate::errors::EnquiryError;
use crate::platforms::BrowserEngine;
use crate::presets::{FieldDef, Presets};
use crate::selector::{FieldSelector, PresetPath};
use crate::workflow::{StepAction, Workflow, WorkflowStep};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// A step that failed but was allowed to continue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub index: usize,
    pub action: StepAction,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Extracted values keyed by the step's `as` name, in extraction order
    pub results: IndexMap<String, String>,
    pub executed_steps: usize,
    pub failures: Vec<StepFailure>,
    pub duration_ms: i64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct WorkflowRunner<'a> {
    engine: &'a dyn BrowserEngine,
    presets: &'a Presets,
    wait_timeout: Duration,
}

impl<'a> WorkflowRunner<'a> {
    pub fn new(engine: &'a dyn BrowserEngine, presets: &'a Presets) -> Self {
        Self {
            engine,
            presets,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Timeout for `wait_for` steps without their own `timeout_ms`
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Runs every step in order.
    ///
    /// `default_path` is used for steps naming a bare `field` when the
    /// workflow itself has no team/screen/tab.
    #[instrument(skip_all, fields(workflow = %workflow.name, steps = workflow.steps.len()))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        context: &HashMap<String, String>,
        default_path: Option<&PresetPath>,
    ) -> Result<RunReport, EnquiryError> {
        let start_time = chrono::Utc::now();
        let own_path = workflow.preset_path();
        let path = own_path.as_ref().or(default_path);
        let mut report = RunReport::default();

        for (index, step) in workflow.steps.iter().enumerate() {
            let step_start = chrono::Utc::now();
            info!(
                "Step {} BEGIN action={} target={}",
                index,
                step.action,
                step.describe(path)
            );

            let outcome = self.execute_step(step, context, path, &mut report).await;
            report.executed_steps += 1;
            let elapsed = (chrono::Utc::now() - step_start).num_milliseconds();

            match outcome {
                Ok(()) => info!("Step {} END action={} status=ok ({elapsed} ms)", index, step.action),
                Err(e) => {
                    if !step.continue_on_error.unwrap_or(false) {
                        info!("Step {} END action={} status=error ({elapsed} ms)", index, step.action);
                        return Err(e);
                    }
                    warn!("Step {} failed, continuing: {e}", index);
                    report.failures.push(StepFailure {
                        index,
                        action: step.action,
                        message: e.to_string(),
                    });
                }
            }

            if let Some(delay_ms) = step.delay_ms {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }

        report.duration_ms = (chrono::Utc::now() - start_time).num_milliseconds();
        Ok(report)
    }

    async fn execute_step(
        &self,
        step: &WorkflowStep,
        context: &HashMap<String, String>,
        path: Option<&PresetPath>,
        report: &mut RunReport,
    ) -> Result<(), EnquiryError> {
        match step.action {
            StepAction::Wait => {
                let seconds = step.wait_seconds();
                if seconds > 0.0 {
                    let pause = Duration::try_from_secs_f64(seconds).map_err(|e| {
                        EnquiryError::InvalidArgument(format!(
                            "Invalid wait of {seconds} seconds: {e}"
                        ))
                    })?;
                    tokio::time::sleep(pause).await;
                }
                return Ok(());
            }
            StepAction::SwitchToDefault => return self.engine.switch_to_default().await,
            _ => {}
        }

        let key = step.key(path)?;
        let def = self.presets.resolve(&key.path, &key.field)?;

        match step.action {
            StepAction::Click => self.engine.click(def.selector.css()?).await,
            StepAction::Input => {
                let value = step
                    .value_from
                    .as_ref()
                    .and_then(|name| context.get(name))
                    .map(String::as_str)
                    .or_else(|| step.literal_value())
                    .unwrap_or("");
                self.engine.clear_and_type(def.selector.css()?, value).await
            }
            StepAction::WaitFor => {
                let timeout = step
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.wait_timeout);
                self.engine.wait_for(def.selector.css()?, timeout).await
            }
            StepAction::SwitchToFrame => self.engine.switch_to_frame(def.selector.css()?).await,
            StepAction::Extract => {
                let text = extract(self.engine, def).await?;
                let name = step.result_key().unwrap_or_else(|| key.field.clone());
                debug!("Extracted text for {}: {}", name, text);
                report.results.insert(name, text);
                Ok(())
            }
            StepAction::Wait | StepAction::SwitchToDefault => Ok(()),
        }
    }
}

async fn extract(engine: &dyn BrowserEngine, def: &FieldDef) -> Result<String, EnquiryError> {
    match &def.selector {
        FieldSelector::Css { selector } => engine.text(selector).await,
        FieldSelector::TableLookup { label, .. } => {
            lookup_table_value(engine, &def.selector)
                .await?
                .ok_or_else(|| {
                    EnquiryError::ElementNotFound(format!("table row labeled '{label}'"))
                })
        }
    }
}

/// Second cell of the first row whose trimmed first cell equals the label.
///
/// Returns `Ok(None)` for CSS selectors and when no row matches.
pub(crate) async fn lookup_table_value(
    engine: &dyn BrowserEngine,
    selector: &FieldSelector,
) -> Result<Option<String>, EnquiryError> {
    let (Some(rows_css), FieldSelector::TableLookup { label, .. }) =
        (selector.rows_selector(), selector)
    else {
        return Ok(None);
    };
    let rows = engine.table_rows(&rows_css).await?;
    Ok(rows
        .iter()
        .find(|cells| cells.first().is_some_and(|first| first.trim() == label.as_str()))
        .map(|cells| cells.get(1).map(|v| v.trim().to_string()).unwrap_or_default()))
}
