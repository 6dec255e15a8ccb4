use enquiry::{FieldValue, RunReport, ScrapeReport};
use indexmap::IndexMap;

/// Outcome of a run or scrape as shown to the operator
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Success,
    Partial,
    Failure,
}

/// Run and scrape results in one displayable shape
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub state: WorkflowState,
    /// Human-readable message about the result
    pub message: String,
    pub window_title: Option<String>,
    /// Extracted values, in extraction order
    pub data: IndexMap<String, String>,
    /// Step or field level problems
    pub errors: Vec<String>,
    pub duration_ms: Option<i64>,
    pub executed_steps: Option<usize>,
}

impl WorkflowResult {
    pub fn from_run(workflow_name: &str, report: &RunReport) -> Self {
        let state = if report.failures.is_empty() {
            WorkflowState::Success
        } else {
            WorkflowState::Partial
        };
        let message = match state {
            WorkflowState::Success => format!("Workflow '{workflow_name}' completed"),
            _ => format!(
                "Workflow '{workflow_name}' completed with {} failed step(s)",
                report.failures.len()
            ),
        };
        Self {
            state,
            message,
            window_title: None,
            data: report.results.clone(),
            errors: report
                .failures
                .iter()
                .map(|f| format!("Step {} ({}): {}", f.index + 1, f.action, f.message))
                .collect(),
            duration_ms: Some(report.duration_ms),
            executed_steps: Some(report.executed_steps),
        }
    }

    pub fn from_scrape(preset: &str, report: &ScrapeReport) -> Self {
        let errors: Vec<String> = report
            .values
            .iter()
            .filter_map(|(name, value)| match value {
                FieldValue::Error(msg) => Some(format!("{name}: {msg}")),
                _ => None,
            })
            .collect();
        let (state, message) = if !report.table_found {
            (
                WorkflowState::Failure,
                "No data table found on the enquiry page".to_string(),
            )
        } else if errors.is_empty() {
            (
                WorkflowState::Success,
                format!("Scraped {} field(s) for {preset}", report.values.len()),
            )
        } else {
            (
                WorkflowState::Partial,
                format!(
                    "Scraped {} field(s) for {preset}, {} with errors",
                    report.values.len(),
                    errors.len()
                ),
            )
        };
        Self {
            state,
            message,
            window_title: report.window_title.clone(),
            data: report.to_record(),
            errors,
            duration_ms: None,
            executed_steps: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == WorkflowState::Success
    }

    /// Display the result in a user-friendly format
    pub fn display(&self) {
        use colored::*;

        println!();
        println!("{}", "═".repeat(60));

        match self.state {
            WorkflowState::Success => {
                println!("{} {}", "✅ SUCCESS:".green().bold(), self.message);
            }
            WorkflowState::Partial => {
                println!("{} {}", "⚠️  PARTIAL:".yellow().bold(), self.message);
            }
            WorkflowState::Failure => {
                println!("{} {}", "❌ FAILURE:".red().bold(), self.message);
            }
        }

        if self.window_title.is_some() || self.executed_steps.is_some() {
            println!("{}", "─".repeat(60));
            println!("📊 Execution Details:");
            if let Some(title) = &self.window_title {
                println!("   • Window: {title}");
            }
            if let Some(steps) = self.executed_steps {
                println!("   • Steps Executed: {steps}");
            }
            if let Some(duration) = self.duration_ms {
                let seconds = duration as f64 / 1000.0;
                println!("   • Duration: {seconds:.2}s");
            }
        }

        println!("{}", "─".repeat(60));
        println!("📦 Extracted Data:");
        if self.data.is_empty() {
            println!("   (No data extracted)");
        } else {
            let width = self.data.keys().map(|k| k.chars().count()).max().unwrap_or(0);
            for (name, value) in &self.data {
                println!("   {name:<width$} : {value}");
            }
        }

        if !self.errors.is_empty() {
            println!("{}", "─".repeat(60));
            println!("{}", "⚠️  Errors:".yellow());
            for error in &self.errors {
                println!("   {} {}", "✗".red(), error);
            }
        }

        println!("{}", "═".repeat(60));
        println!();
    }
}
