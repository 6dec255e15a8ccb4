//! Declarative workflow definitions and their JSON/YAML persistence.

use crate::errors::EnquiryError;
use crate::presets::Presets;
use crate::selector::{PresetPath, SelectorKey};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// The instruction set understood by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Click,
    Input,
    #[serde(alias = "wait_for_element")]
    WaitFor,
    Wait,
    Extract,
    SwitchToFrame,
    #[serde(alias = "switch_to_default_content")]
    SwitchToDefault,
}

impl StepAction {
    /// Whether the step addresses a preset field.
    pub fn needs_selector(self) -> bool {
        !matches!(self, StepAction::Wait | StepAction::SwitchToDefault)
    }

    /// Whether the resolved selector must be a CSS selector (table lookups only extract).
    pub fn needs_css(self) -> bool {
        matches!(
            self,
            StepAction::Click | StepAction::Input | StepAction::WaitFor | StepAction::SwitchToFrame
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepAction::Click => "click",
            StepAction::Input => "input",
            StepAction::WaitFor => "wait_for",
            StepAction::Wait => "wait",
            StepAction::Extract => "extract",
            StepAction::SwitchToFrame => "switch_to_frame",
            StepAction::SwitchToDefault => "switch_to_default",
        }
    }
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepAction {
    type Err = EnquiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
            .map_err(|_| EnquiryError::InvalidArgument(format!("Unknown step action: '{s}'")))
    }
}

/// Parameters block written by older workflow files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    pub value: Option<String>,
    pub seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub action: StepAction,
    /// Field name, looked up under the workflow's team/screen/tab
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Fully qualified `team/screen/tab/field`, overrides `field`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing)]
    pub params: Option<StepParams>,
}

impl WorkflowStep {
    pub fn new(action: StepAction) -> Self {
        Self {
            action,
            field: None,
            selector_key: None,
            value: None,
            value_from: None,
            output: None,
            seconds: None,
            timeout_ms: None,
            continue_on_error: None,
            delay_ms: None,
            params: None,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn selector_key(mut self, key: impl Into<String>) -> Self {
        self.selector_key = Some(key.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn value_from(mut self, key: impl Into<String>) -> Self {
        self.value_from = Some(key.into());
        self
    }

    pub fn output(mut self, key: impl Into<String>) -> Self {
        self.output = Some(key.into());
        self
    }

    pub fn seconds(mut self, seconds: f64) -> Self {
        self.seconds = Some(seconds);
        self
    }

    pub fn continue_on_error(mut self, flag: bool) -> Self {
        self.continue_on_error = Some(flag);
        self
    }

    /// Folds a legacy `params` block into the flat fields.
    fn normalize(&mut self) {
        if let Some(params) = self.params.take() {
            if self.value.is_none() {
                self.value = params.value;
            }
            if self.seconds.is_none() {
                self.seconds = params.seconds;
            }
        }
    }

    /// Literal input value, falling back to the legacy params block.
    pub fn literal_value(&self) -> Option<&str> {
        self.value
            .as_deref()
            .or_else(|| self.params.as_ref().and_then(|p| p.value.as_deref()))
    }

    pub fn wait_seconds(&self) -> f64 {
        self.seconds
            .or_else(|| self.params.as_ref().and_then(|p| p.seconds))
            .unwrap_or(0.0)
    }

    /// Key under which an extracted value is stored.
    pub fn result_key(&self) -> Option<String> {
        self.output.clone().or_else(|| self.field_name())
    }

    fn field_name(&self) -> Option<String> {
        match &self.selector_key {
            Some(key) => key.parse::<SelectorKey>().ok().map(|k| k.field),
            None => self.field.clone(),
        }
    }

    /// Resolves the fully qualified key this step addresses.
    pub fn key(&self, default_path: Option<&PresetPath>) -> Result<SelectorKey, EnquiryError> {
        if let Some(key) = &self.selector_key {
            return key.parse();
        }
        let field = self
            .field
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                EnquiryError::InvalidArgument(format!(
                    "Step '{}' needs a field or selector_key",
                    self.action
                ))
            })?;
        let path = default_path.ok_or_else(|| {
            EnquiryError::InvalidArgument(format!(
                "Step '{}' on field '{field}' has no team/screen/tab to look it up in",
                self.action
            ))
        })?;
        Ok(path.key(field))
    }

    /// One-line summary, `action → key`.
    pub fn describe(&self, default_path: Option<&PresetPath>) -> String {
        let target = match (self.action.needs_selector(), self.key(default_path)) {
            (true, Ok(key)) => key.to_string(),
            (true, Err(_)) => self
                .selector_key
                .clone()
                .or_else(|| self.field.clone())
                .unwrap_or_else(|| "?".to_string()),
            (false, _) if self.action == StepAction::Wait => format!("{}s", self.wait_seconds()),
            (false, _) => "-".to_string(),
        };
        format!("{} → {}", self.action, target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team: None,
            screen: None,
            tab: None,
            steps: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: &PresetPath) -> Self {
        self.set_path(path);
        self
    }

    pub fn set_path(&mut self, path: &PresetPath) {
        self.team = Some(path.team.clone());
        self.screen = Some(path.screen.clone());
        self.tab = Some(path.tab.clone());
    }

    /// Workflow-level team/screen/tab when all three are set.
    pub fn preset_path(&self) -> Option<PresetPath> {
        match (&self.team, &self.screen, &self.tab) {
            (Some(team), Some(screen), Some(tab)) => Some(PresetPath::new(team, screen, tab)),
            _ => None,
        }
    }

    pub fn add_step(&mut self, step: WorkflowStep) {
        self.steps.push(step);
    }

    pub fn remove_step(&mut self, index: usize) -> Result<WorkflowStep, EnquiryError> {
        if index >= self.steps.len() {
            return Err(EnquiryError::InvalidArgument(format!(
                "Step index {index} out of range (workflow has {} steps)",
                self.steps.len()
            )));
        }
        Ok(self.steps.remove(index))
    }

    pub fn from_json(json: &str) -> Result<Self, EnquiryError> {
        let workflow: Workflow = serde_json::from_str(json)?;
        Ok(workflow.normalized())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, EnquiryError> {
        let workflow: Workflow = serde_yaml::from_str(yaml)?;
        Ok(workflow.normalized())
    }

    fn normalized(mut self) -> Self {
        self.steps.iter_mut().for_each(WorkflowStep::normalize);
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EnquiryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let workflow = if is_yaml(path) {
            Self::from_yaml(&content)?
        } else {
            Self::from_json(&content)?
        };
        info!(
            name = %workflow.name,
            steps = workflow.steps.len(),
            "Loaded workflow from {}",
            path.display()
        );
        Ok(workflow)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EnquiryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Problems found by checking a workflow against the presets without a browser.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate_workflow(
    workflow: &Workflow,
    presets: &Presets,
    default_path: Option<&PresetPath>,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    if workflow.steps.is_empty() {
        report
            .errors
            .push("Workflow must contain at least one step".to_string());
        return report;
    }

    let own_path = workflow.preset_path();
    let path = own_path.as_ref().or(default_path);

    for (i, step) in workflow.steps.iter().enumerate() {
        let n = i + 1;
        if step.action == StepAction::Input
            && step.literal_value().is_none()
            && step.value_from.is_none()
        {
            report.warnings.push(format!(
                "Step {n} (input) has neither 'value' nor 'value_from'; it will type an empty string"
            ));
        }
        if step.action == StepAction::Wait {
            let seconds = step.wait_seconds();
            if seconds <= 0.0 {
                report
                    .warnings
                    .push(format!("Step {n} (wait) has no positive 'seconds'"));
            } else if Duration::try_from_secs_f64(seconds).is_err() {
                report
                    .errors
                    .push(format!("Step {n} (wait) has an out-of-range 'seconds' value {seconds}"));
            }
        }
        if !step.action.needs_selector() {
            continue;
        }

        let key = match step.key(path) {
            Ok(key) => key,
            Err(e) => {
                report.errors.push(format!("Step {n}: {e}"));
                continue;
            }
        };
        match presets.resolve(&key.path, &key.field) {
            Ok(def) => {
                if step.action.needs_css() {
                    if let Err(e) = def.selector.css() {
                        report.errors.push(format!("Step {n} ({}): {e}", step.action));
                    }
                }
            }
            Err(e) => report.errors.push(format!("Step {n}: {e}")),
        }
    }
    report
}
