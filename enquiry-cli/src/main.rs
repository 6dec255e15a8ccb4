//! Enquiry CLI
//!
//! Manage field presets and workflows, scrape the enquiry web application
//! through a running WebDriver server, compare scraped spreadsheets against a
//! template and mail-merge letters.
//!
//! Usage:
//!   enquiry preset list
//!   enquiry preset add Retail/Customer/Profile --field name=#cust-name
//!   enquiry scrape --url enquiry.bank.local --preset Retail/Customer/Profile --output out.xlsx
//!   enquiry run lookup.yaml --url enquiry.bank.local --var cif=001
//!   enquiry compare template.xlsx out.xlsx
//!   enquiry mail rows.xlsx template.docx letters/

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use enquiry::presets::TabFields;
use enquiry::{
    compare_excel_files, generate_letters, Browser, EngineConfig, EnquirySession, FieldDef,
    FieldSelector, MailOptions, PresetPath, PresetStore, Presets, ScrapeOptions, StepAction,
    Table, WindowWatch, Workflow, WorkflowRunner, WorkflowStep,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

mod workflow_result;
mod workflow_validator;

use workflow_result::WorkflowResult;
use workflow_validator::WorkflowValidator;

#[derive(Parser, Debug)]
#[command(name = "enquiry")]
#[command(about = "🔎 Enquiry CLI - preset-driven scraping of the enquiry web application")]
struct Cli {
    /// Preset file (team/screen/tab/field selectors)
    #[clap(long, global = true, env = "ENQUIRY_PRESETS", default_value = "presets.json")]
    presets: PathBuf,

    /// URL of the running WebDriver server (msedgedriver, chromedriver, geckodriver)
    #[clap(
        long,
        global = true,
        env = "ENQUIRY_WEBDRIVER_URL",
        default_value = "http://localhost:9515"
    )]
    webdriver_url: String,

    /// Browser the WebDriver server should start: edge, chrome or firefox
    #[clap(long, global = true, env = "ENQUIRY_BROWSER", default_value = "edge")]
    browser: Browser,

    /// Directory for the daily log files
    #[clap(long, global = true, env = "ENQUIRY_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Debug-level logging
    #[clap(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage field presets
    #[command(subcommand)]
    Preset(PresetCommands),
    /// Inspect and edit workflow files
    #[command(subcommand)]
    Workflow(WorkflowCommands),
    /// Open the enquiry app and run a workflow after login
    Run(RunArgs),
    /// Open the enquiry app and scrape a preset tab after login
    Scrape(ScrapeArgs),
    /// Compare a scraped spreadsheet against a template
    Compare(CompareArgs),
    /// Generate one .docx letter per spreadsheet row
    Mail(MailArgs),
}

#[derive(Subcommand, Debug)]
enum PresetCommands {
    /// List every team/screen/tab
    List,
    /// Show the fields of a tab
    Show { path: PresetPath },
    /// Add a new tab with its fields
    Add {
        path: PresetPath,
        /// Field as name=selector; selector is CSS or table:<table_id>|<label>
        #[clap(long = "field", value_parser = parse_field)]
        fields: Vec<(String, FieldSelector)>,
    },
    /// Add or replace one field of an existing tab
    SetField {
        path: PresetPath,
        name: String,
        /// CSS selector or table:<table_id>|<label>
        selector: FieldSelector,
        /// Keep the field but skip it when scraping
        #[clap(long)]
        disabled: bool,
    },
    /// Remove one field of a tab
    RemoveField { path: PresetPath, name: String },
    /// Remove a whole team or a single team/screen/tab
    Remove { target: String },
}

#[derive(Subcommand, Debug)]
enum WorkflowCommands {
    /// Print the steps of a workflow
    Show {
        file: PathBuf,
        #[clap(long)]
        preset: Option<PresetPath>,
    },
    /// Check every step against the preset file
    Validate {
        file: PathBuf,
        #[clap(long)]
        preset: Option<PresetPath>,
    },
    /// Append a step, creating the workflow file if needed
    AddStep(AddStepArgs),
    /// Remove a step by its 1-based number
    RemoveStep { file: PathBuf, number: usize },
}

#[derive(Args, Debug)]
struct AddStepArgs {
    file: PathBuf,
    /// click, input, wait_for, wait, extract, switch_to_frame, switch_to_default
    action: StepAction,
    #[clap(long)]
    field: Option<String>,
    /// Fully qualified team/screen/tab/field
    #[clap(long)]
    selector_key: Option<String>,
    #[clap(long)]
    value: Option<String>,
    /// Context variable to type instead of a literal value
    #[clap(long)]
    value_from: Option<String>,
    /// Result name for extract steps
    #[clap(long = "as")]
    output: Option<String>,
    #[clap(long)]
    seconds: Option<f64>,
    #[clap(long)]
    timeout_ms: Option<u64>,
    #[clap(long)]
    delay_ms: Option<u64>,
    #[clap(long)]
    continue_on_error: bool,
    /// Name for a new workflow (defaults to the file stem)
    #[clap(long)]
    name: Option<String>,
    /// Team/screen/tab for a new workflow
    #[clap(long)]
    preset: Option<PresetPath>,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Enquiry application URL; https:// is added when no scheme is given
    #[clap(long)]
    url: String,

    /// Append the results as one row to this .xlsx or .csv file
    #[clap(long, short)]
    output: Option<PathBuf>,

    /// Skip the login prompt and start immediately
    #[clap(long)]
    no_login_prompt: bool,

    /// Seconds to wait for the enquiry window after login
    #[clap(long, default_value_t = 20)]
    window_wait: u32,
}

#[derive(Args, Debug)]
struct RunArgs {
    workflow: PathBuf,

    #[command(flatten)]
    session: SessionArgs,

    /// Team/screen/tab for steps that name only a field
    #[clap(long)]
    preset: Option<PresetPath>,

    /// Context variable as key=value, used by input steps with value_from
    #[clap(long = "var", value_parser = parse_key_value)]
    vars: Vec<(String, String)>,

    /// JSON object of context variables
    #[clap(long)]
    inputs: Option<PathBuf>,

    /// Timeout in seconds for wait_for steps
    #[clap(long, default_value_t = 10)]
    wait_timeout: u64,
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    #[command(flatten)]
    session: SessionArgs,

    #[clap(long)]
    preset: PresetPath,

    /// Name of the frame holding the data table
    #[clap(long, default_value = "enqframe")]
    frame_name: String,

    /// Id of the data table
    #[clap(long, default_value = "info-table")]
    table_id: String,
}

#[derive(Args, Debug)]
struct CompareArgs {
    template: PathBuf,
    target: PathBuf,
    /// Print the comparison without writing status columns to the target
    #[clap(long)]
    no_save: bool,
}

#[derive(Args, Debug)]
struct MailArgs {
    rows: PathBuf,
    template: PathBuf,
    out_dir: PathBuf,
    #[clap(long, default_value = "Surat")]
    prefix: String,
    /// Column naming each generated file
    #[clap(long, default_value = "Nama_Nasabah")]
    name_column: String,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_field(s: &str) -> Result<(String, FieldSelector), String> {
    let (name, selector) = parse_key_value(s)?;
    let selector = selector.parse::<FieldSelector>().map_err(|e| e.to_string())?;
    Ok((name, selector))
}

fn init_logging(log_dir: Option<&Path>, verbose: bool) {
    use tracing_appender::rolling;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("enquiry")
            .join("logs"),
    };

    // Create log directory if it doesn't exist
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = rolling::daily(&log_dir, "enquiry.log");

    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            // Respect RUST_LOG if provided
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref(), cli.verbose);

    let store = PresetStore::new(&cli.presets);
    let engine_config = EngineConfig {
        webdriver_url: cli.webdriver_url.clone(),
        browser: cli.browser,
    };

    match cli.command {
        Commands::Preset(cmd) => handle_preset_command(&store, cmd),
        Commands::Workflow(cmd) => handle_workflow_command(&store, cmd),
        Commands::Run(args) => run_workflow(&store, &engine_config, args).await,
        Commands::Scrape(args) => scrape(&store, &engine_config, args).await,
        Commands::Compare(args) => {
            let (output, log) = compare_excel_files(&args.template, &args.target, !args.no_save)
                .context("Comparison failed")?;
            println!("{log}");
            if !args.no_save {
                println!(
                    "{} Comparison result saved to: {}",
                    "✅".green(),
                    output.display()
                );
            }
            Ok(())
        }
        Commands::Mail(args) => {
            let options = MailOptions {
                file_prefix: args.prefix,
                name_column: args.name_column,
            };
            let report = generate_letters(&args.rows, &args.template, &args.out_dir, &options)
                .context("Mail merge failed")?;
            println!("{} {}", "✅".green(), report.summary());
            Ok(())
        }
    }
}

fn handle_preset_command(store: &PresetStore, cmd: PresetCommands) -> Result<()> {
    match cmd {
        PresetCommands::List => {
            let presets = load_presets(store)?;
            if presets.is_empty() {
                println!("No presets in {}", store.path().display());
            }
            for path in presets.paths() {
                let count = presets.fields(&path).map(|f| f.len()).unwrap_or(0);
                println!("{path}  ({count} fields)");
            }
        }
        PresetCommands::Show { path } => {
            let presets = load_presets(store)?;
            let fields = presets
                .fields(&path)
                .with_context(|| format!("Preset not found: {path}"))?;
            display_fields(&path, fields);
        }
        PresetCommands::Add { path, fields } => {
            let fields: TabFields = fields
                .into_iter()
                .map(|(name, selector)| (name, FieldDef::new(selector)))
                .collect();
            store.update(|presets| presets.add_tab(&path, fields))?;
            println!("{} Added preset {path}", "✅".green());
        }
        PresetCommands::SetField {
            path,
            name,
            selector,
            disabled,
        } => {
            let def = if disabled {
                FieldDef::new(selector).disabled()
            } else {
                FieldDef::new(selector)
            };
            store.update(|presets| presets.set_field(&path, &name, def))?;
            println!("{} Saved field '{name}' in {path}", "✅".green());
        }
        PresetCommands::RemoveField { path, name } => {
            if !store.remove(|presets| presets.remove_field(&path, &name))? {
                bail!("Field '{name}' not found in {path}");
            }
            println!("{} Removed field '{name}' from {path}", "✅".green());
        }
        PresetCommands::Remove { target } => {
            let removed = if target.contains('/') {
                let path: PresetPath = target.parse()?;
                store.remove(|presets| presets.remove_tab(&path))?
            } else {
                store.remove(|presets| presets.remove_team(target.trim()))?
            };
            if !removed {
                bail!("Preset not found: {target}");
            }
            println!("{} Removed {target}", "✅".green());
        }
    }
    Ok(())
}

fn display_fields(path: &PresetPath, fields: &TabFields) {
    println!();
    println!("{} {}", "Preset:".bold(), path);
    println!("{}", "─".repeat(60));
    if fields.is_empty() {
        println!("  (no fields)");
    }
    let width = fields.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for (name, def) in fields {
        let mut line = format!("  {name:<width$}  {:<12} {}", def.selector.kind(), def.selector);
        if !def.enabled {
            line.push_str(&format!(" {}", "[disabled]".dimmed()));
        }
        println!("{line}");
    }
    println!();
}

fn load_presets(store: &PresetStore) -> Result<Presets> {
    store
        .load()
        .with_context(|| format!("Failed to load presets from {}", store.path().display()))
}

fn handle_workflow_command(store: &PresetStore, cmd: WorkflowCommands) -> Result<()> {
    match cmd {
        WorkflowCommands::Show { file, preset } => {
            let workflow = load_workflow(&file)?;
            WorkflowValidator::display_workflow(&workflow, preset.as_ref());
        }
        WorkflowCommands::Validate { file, preset } => {
            let workflow = load_workflow(&file)?;
            let presets = load_presets(store)?;
            let report = WorkflowValidator::validate(&workflow, &presets, preset.as_ref());
            WorkflowValidator::display_results(&workflow, &report);
            if !report.is_valid() {
                bail!("Workflow validation failed with {} error(s)", report.errors.len());
            }
        }
        WorkflowCommands::AddStep(args) => {
            let mut workflow = if args.file.exists() {
                load_workflow(&args.file)?
            } else {
                let name = args.name.clone().unwrap_or_else(|| {
                    args.file
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "workflow".to_string())
                });
                Workflow::new(name)
            };
            if let Some(path) = &args.preset {
                workflow.set_path(path);
            }
            let step = build_step(&args);
            let path = workflow.preset_path();
            println!("{} Added step {}", "✅".green(), step.describe(path.as_ref()));
            workflow.add_step(step);
            workflow
                .save(&args.file)
                .with_context(|| format!("Failed to save {}", args.file.display()))?;
        }
        WorkflowCommands::RemoveStep { file, number } => {
            let mut workflow = load_workflow(&file)?;
            if number == 0 {
                bail!("Step numbers start at 1");
            }
            let step = workflow.remove_step(number - 1)?;
            workflow.save(&file)?;
            println!("{} Removed step {number}: {}", "✅".green(), step.action);
        }
    }
    Ok(())
}

fn build_step(args: &AddStepArgs) -> WorkflowStep {
    let mut step = WorkflowStep::new(args.action);
    step.field = args.field.clone();
    step.selector_key = args.selector_key.clone();
    step.value = args.value.clone();
    step.value_from = args.value_from.clone();
    step.output = args.output.clone();
    step.seconds = args.seconds;
    step.timeout_ms = args.timeout_ms;
    step.delay_ms = args.delay_ms;
    if args.continue_on_error {
        step.continue_on_error = Some(true);
    }
    step
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    Workflow::load(file).with_context(|| format!("Failed to load workflow {}", file.display()))
}

fn load_context(args: &RunArgs) -> Result<HashMap<String, String>> {
    let mut context = HashMap::new();
    if let Some(inputs) = &args.inputs {
        let content = std::fs::read_to_string(inputs)
            .with_context(|| format!("Failed to read {}", inputs.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", inputs.display()))?;
        let serde_json::Value::Object(map) = value else {
            bail!("{} must contain a JSON object", inputs.display());
        };
        for (key, value) in map {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            context.insert(key, text);
        }
    }
    context.extend(args.vars.iter().cloned());
    Ok(context)
}

/// Connects, opens the app and waits for the operator to reach the enquiry window.
async fn start_session(config: &EngineConfig, args: &SessionArgs) -> Result<EnquirySession> {
    let session = EnquirySession::connect(config).await.with_context(|| {
        format!(
            "Could not reach the WebDriver server at {}. Is {} running?",
            config.webdriver_url,
            driver_name(config.browser)
        )
    })?;
    session.open(&args.url).await?;

    if !args.no_login_prompt {
        println!(
            "{} Log in to the enquiry application in the browser, then press Enter...",
            "👉".cyan()
        );
        let mut line = String::new();
        tokio::io::BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
    }

    let watch = WindowWatch {
        attempts: args.window_wait,
        interval: Duration::from_secs(1),
    };
    match session.wait_for_new_window(watch).await? {
        Some(title) => info!("Enquiry window: {title}"),
        None => warn!("No new window appeared; continuing in the current window"),
    }
    Ok(session)
}

fn driver_name(browser: Browser) -> &'static str {
    match browser {
        Browser::Edge => "msedgedriver",
        Browser::Chrome => "chromedriver",
        Browser::Firefox => "geckodriver",
    }
}

fn save_record(output: &Path, record: &indexmap::IndexMap<String, String>) -> Result<()> {
    Table::append_to_file(output, record)
        .with_context(|| format!("Failed to write results to {}", output.display()))?;
    println!("{} Results appended to {}", "💾".cyan(), output.display());
    Ok(())
}

/// Turns a partial or failed result into a non-zero exit once it has been shown.
fn finish(result: &WorkflowResult) -> Result<()> {
    if result.is_success() {
        Ok(())
    } else {
        bail!("{}", result.message)
    }
}

async fn run_workflow(store: &PresetStore, config: &EngineConfig, args: RunArgs) -> Result<()> {
    let workflow = load_workflow(&args.workflow)?;
    let presets = load_presets(store)?;
    let context = load_context(&args)?;

    let report = WorkflowValidator::validate(&workflow, &presets, args.preset.as_ref());
    if !report.is_valid() {
        WorkflowValidator::display_results(&workflow, &report);
        bail!("Workflow '{}' is not valid for {}", workflow.name, store.path().display());
    }

    let session = start_session(config, &args.session).await?;
    let outcome = WorkflowRunner::new(session.engine(), &presets)
        .with_wait_timeout(Duration::from_secs(args.wait_timeout))
        .run(&workflow, &context, args.preset.as_ref())
        .await;
    let outcome = match outcome {
        Ok(report) => {
            let result = WorkflowResult::from_run(&workflow.name, &report);
            result.display();
            let saved = match &args.session.output {
                Some(output) => save_record(output, &report.results),
                None => Ok(()),
            };
            saved.and_then(|()| finish(&result))
        }
        Err(e) => {
            Err(anyhow::Error::new(e).context(format!("Workflow '{}' failed", workflow.name)))
        }
    };

    if let Err(e) = session.close().await {
        warn!("Failed to close the browser: {e}");
    }
    outcome
}

async fn scrape(store: &PresetStore, config: &EngineConfig, args: ScrapeArgs) -> Result<()> {
    let presets = load_presets(store)?;
    if presets.fields(&args.preset).is_none() {
        bail!("Preset not found: {}", args.preset);
    }
    let options = ScrapeOptions {
        frame_name: args.frame_name.clone(),
        data_table_id: args.table_id.clone(),
        ..ScrapeOptions::default()
    };

    let session = start_session(config, &args.session).await?;
    let outcome = match session.scrape_preset(&presets, &args.preset, &options).await {
        Ok(report) => {
            let result = WorkflowResult::from_scrape(&args.preset.to_string(), &report);
            result.display();
            let saved = match (&args.session.output, report.table_found) {
                (Some(output), true) => save_record(output, &report.to_record()),
                _ => Ok(()),
            };
            saved.and_then(|()| finish(&result))
        }
        Err(e) => Err(anyhow::Error::new(e).context("Error in scraping logic")),
    };

    if let Err(e) = session.close().await {
        warn!("Failed to close the browser: {e}");
    }
    outcome
}
