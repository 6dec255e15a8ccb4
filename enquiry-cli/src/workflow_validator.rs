use colored::*;
use enquiry::{validate_workflow, PresetPath, Presets, ValidationReport, Workflow};

/// Checks workflows against the preset file before a browser is involved
pub struct WorkflowValidator;

impl WorkflowValidator {
    pub fn validate(
        workflow: &Workflow,
        presets: &Presets,
        default_path: Option<&PresetPath>,
    ) -> ValidationReport {
        validate_workflow(workflow, presets, default_path)
    }

    /// Numbered step listing, 1-based to match `remove-step`
    pub fn display_workflow(workflow: &Workflow, default_path: Option<&PresetPath>) {
        let own_path = workflow.preset_path();
        let path = own_path.as_ref().or(default_path);

        println!();
        println!("{} {}", "Workflow:".bold(), workflow.name);
        match path {
            Some(path) => println!("{} {}", "Preset:".bold(), path),
            None => println!("{} {}", "Preset:".bold(), "(none)".dimmed()),
        }
        println!("{}", "─".repeat(60));
        if workflow.steps.is_empty() {
            println!("  (no steps)");
        }
        for (i, step) in workflow.steps.iter().enumerate() {
            let mut line = format!("{:>3}. {}", i + 1, step.describe(path));
            if let Some(from) = &step.value_from {
                line.push_str(&format!(" (value from '{from}')"));
            } else if let Some(value) = step.literal_value() {
                line.push_str(&format!(" (value '{value}')"));
            }
            if let Some(output) = &step.output {
                line.push_str(&format!(" as '{output}'"));
            }
            if step.continue_on_error.unwrap_or(false) {
                line.push_str(&format!(" {}", "[continue on error]".dimmed()));
            }
            println!("{line}");
        }
        println!();
    }

    /// Display validation results in a user-friendly format
    pub fn display_results(workflow: &Workflow, result: &ValidationReport) {
        println!();
        println!("{}", "═".repeat(60));
        println!("{} {}", "WORKFLOW VALIDATION REPORT:".bold(), workflow.name);
        println!("{}", "═".repeat(60));

        let status = if result.errors.is_empty() {
            if result.warnings.is_empty() {
                "✅ VALID".green().bold()
            } else {
                "⚠️  VALID WITH WARNINGS".yellow().bold()
            }
        } else {
            "❌ INVALID".red().bold()
        };

        println!("\nStatus: {status}");
        println!("Steps: {}", workflow.steps.len());
        println!("{}", "─".repeat(60));

        if !result.errors.is_empty() {
            println!("\n{}", "Errors:".red().bold());
            for error in &result.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if !result.warnings.is_empty() {
            println!("\n{}", "Warnings:".yellow().bold());
            for warning in &result.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !result.errors.is_empty() {
            println!("\n{}", "Recommendations:".cyan().bold());
            println!("  • Add missing fields with 'enquiry preset set-field'");
            println!("  • Give the workflow a team/screen/tab or pass --preset");
        }

        println!("\n{}", "═".repeat(60));
        println!();
    }
}
